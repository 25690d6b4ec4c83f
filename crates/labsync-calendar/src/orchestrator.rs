//! Drives one provider adapter for the lifecycle of local events.

use std::sync::Arc;

use labsync_auth::{CredentialBundle, CredentialStore};
use labsync_core::{ActorId, Provider};
use labsync_services::{Event, EventBackend};
use tracing::instrument;

use crate::adapter::{AuthCheck, CalendarAdapter};
use crate::error::FailureKind;
use crate::outcome::{
    OutcomeSink, SkipReason, SyncAttempt, SyncFailure, SyncOperation, SyncOutcome, TracingSink,
};

/// Reconciles local events with the configured provider.
///
/// `reconcile` never fails: every problem becomes a [`SyncOutcome`] that is
/// reported to the sink and returned to the caller as advice.
pub struct SyncOrchestrator {
    adapter: Arc<dyn CalendarAdapter>,
    credentials: Arc<dyn CredentialStore>,
    events: Arc<dyn EventBackend>,
    sink: Arc<dyn OutcomeSink>,
    enabled: bool,
}

impl SyncOrchestrator {
    pub fn new(
        adapter: Arc<dyn CalendarAdapter>,
        credentials: Arc<dyn CredentialStore>,
        events: Arc<dyn EventBackend>,
    ) -> Self {
        Self {
            adapter,
            credentials,
            events,
            sink: Arc::new(TracingSink),
            enabled: true,
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn OutcomeSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn provider(&self) -> Provider {
        self.adapter.provider()
    }

    #[instrument(skip_all, fields(event_id = event.id, operation = %operation), level = "debug")]
    pub async fn reconcile(&self, event: &Event, operation: SyncOperation) -> SyncOutcome {
        let outcome = self.run(event, operation).await;

        self.sink.record(&SyncAttempt {
            event_id: event.id,
            actor: event.owner.id,
            provider: self.provider(),
            operation,
            outcome: outcome.clone(),
        });

        outcome
    }

    async fn run(&self, event: &Event, operation: SyncOperation) -> SyncOutcome {
        if !self.enabled {
            return SyncOutcome::Skipped(SkipReason::Disabled);
        }

        // Never synced: deleting it touches neither credentials nor the network
        if operation == SyncOperation::Deleted && !event.is_synced() {
            return SyncOutcome::NoOp;
        }

        let bundle = match self.authenticated_bundle(event).await {
            Ok(bundle) => bundle,
            Err(outcome) => return outcome,
        };

        match (operation, event.remote_event_id.as_deref()) {
            (SyncOperation::Deleted, Some(remote_id)) => {
                self.remove(event.owner.id, bundle, remote_id).await
            }
            (SyncOperation::Deleted, None) => SyncOutcome::NoOp,
            (SyncOperation::Created | SyncOperation::Updated, _) => {
                let current = self.with_stored_remote(event);
                self.push(bundle, &current).await
            }
        }
    }

    /// `event` with the remote identity currently on record, so a stale copy
    /// held by the caller never creates a second remote event.
    fn with_stored_remote(&self, event: &Event) -> Event {
        let mut current = event.clone();
        match self.events.get(event.id) {
            Ok(Some(stored)) if stored.is_synced() => {
                current.remote_event_id = stored.remote_event_id;
                current.remote_link = stored.remote_link;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!("Could not re-read event {} before sync: {}", event.id, e);
            }
        }
        current
    }

    /// Load the owner's bundle and make sure it is usable, persisting any renewal.
    async fn authenticated_bundle(&self, event: &Event) -> Result<CredentialBundle, SyncOutcome> {
        let actor = event.owner.id;
        let provider = self.provider();

        let bundle = match self.credentials.load(actor, provider) {
            Ok(Some(bundle)) => bundle,
            Ok(None) => return Err(SyncOutcome::Skipped(SkipReason::NotConnected)),
            Err(e) => {
                return Err(SyncOutcome::Failed(SyncFailure::Credentials(e.to_string())));
            }
        };

        match self.adapter.check_auth(&bundle).await {
            AuthCheck::Valid => Ok(bundle),
            AuthCheck::Renewed(renewed) => {
                self.persist_renewed(actor, &renewed);
                Ok(renewed)
            }
            AuthCheck::Invalid(reason) => {
                tracing::info!("{} credentials for actor {} unusable: {}", provider, actor, reason);
                Err(SyncOutcome::Skipped(SkipReason::AuthExpired))
            }
        }
    }

    /// Refresh after the provider rejected `bundle`'s access token.
    async fn renew_rejected(
        &self,
        actor: ActorId,
        bundle: &CredentialBundle,
    ) -> Option<CredentialBundle> {
        match self.adapter.renew(bundle).await {
            AuthCheck::Renewed(renewed) => {
                self.persist_renewed(actor, &renewed);
                Some(renewed)
            }
            AuthCheck::Valid => None,
            AuthCheck::Invalid(reason) => {
                tracing::info!(
                    "{} token for actor {} rejected and not renewable: {}",
                    self.provider(),
                    actor,
                    reason
                );
                None
            }
        }
    }

    fn persist_renewed(&self, actor: ActorId, renewed: &CredentialBundle) {
        if let Err(e) = self.credentials.save(actor, self.provider(), renewed) {
            // The renewed token still works for this attempt
            tracing::warn!(
                "Failed to persist renewed {} credentials for actor {}: {}",
                self.provider(),
                actor,
                e
            );
        }
    }

    async fn push(&self, bundle: CredentialBundle, event: &Event) -> SyncOutcome {
        let mut result = self.adapter.sync_event(&bundle, event).await;
        if matches!(&result, Err(e) if e.kind() == FailureKind::AuthExpired) {
            match self.renew_rejected(event.owner.id, &bundle).await {
                Some(renewed) => result = self.adapter.sync_event(&renewed, event).await,
                None => return SyncOutcome::Skipped(SkipReason::AuthExpired),
            }
        }

        let remote = match result {
            Ok(remote) => remote,
            Err(e) if e.kind() == FailureKind::AuthExpired => {
                return SyncOutcome::Skipped(SkipReason::AuthExpired);
            }
            Err(e) => {
                return SyncOutcome::Failed(SyncFailure::Provider {
                    kind: e.kind(),
                    message: e.to_string(),
                });
            }
        };

        if let Err(e) = self.events.set_remote(event.id, &remote.id, remote.link.as_deref()) {
            return SyncOutcome::Failed(SyncFailure::WriteBack {
                remote_event_id: remote.id,
                message: e.to_string(),
            });
        }

        SyncOutcome::Synced {
            remote_event_id: remote.id,
            remote_link: remote.link,
            replaced: remote.replaced,
        }
    }

    async fn remove(
        &self,
        actor: ActorId,
        bundle: CredentialBundle,
        remote_id: &str,
    ) -> SyncOutcome {
        let mut result = self.adapter.remove_event(&bundle, remote_id).await;
        if matches!(&result, Err(e) if e.kind() == FailureKind::AuthExpired) {
            if let Some(renewed) = self.renew_rejected(actor, &bundle).await {
                result = self.adapter.remove_event(&renewed, remote_id).await;
            }
        }

        match result {
            Ok(()) => SyncOutcome::Deleted {
                remote_event_id: remote_id.to_string(),
            },
            Err(e) => {
                tracing::warn!("Failed to delete {} event {}: {}", self.provider(), remote_id, e);
                SyncOutcome::Failed(SyncFailure::DeleteFailed {
                    remote_event_id: remote_id.to_string(),
                })
            }
        }
    }
}
