//! Common capability interface every calendar provider implements.
//!
//! Provider-specific extras are exposed through narrower traits reached via
//! explicit capability accessors ([`CalendarAdapter::message_sender`]).

use async_trait::async_trait;
use labsync_auth::{CredentialBundle, TokenRefresher};
use labsync_core::Provider;
use labsync_services::{Event, Message};

use crate::error::ProviderError;

/// Result of validating a bundle before use
#[derive(Debug, Clone, PartialEq)]
pub enum AuthCheck {
    /// Access token usable as-is
    Valid,
    /// Access token was silently renewed; the caller should persist this bundle
    Renewed(CredentialBundle),
    /// Not usable and could not be renewed
    Invalid(String),
}

impl AuthCheck {
    pub fn is_authenticated(&self) -> bool {
        !matches!(self, Self::Invalid(_))
    }
}

/// Provider-side identity of a synced event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEvent {
    pub id: String,
    /// Human-navigable URL; advisory only
    pub link: Option<String>,
    /// Stale remote id that was replaced after the provider reported it missing
    pub replaced: Option<String>,
}

#[async_trait]
pub trait CalendarAdapter: Send + Sync {
    fn provider(&self) -> Provider;

    /// Validate the bundle, attempting a silent refresh when it is close to
    /// expiry and a refresh token is present.
    async fn check_auth(&self, bundle: &CredentialBundle) -> AuthCheck;

    /// Refresh unconditionally after the provider rejected the access token.
    /// `Invalid` when there is no refresh token or the refresh fails.
    async fn renew(&self, bundle: &CredentialBundle) -> AuthCheck;

    async fn is_authenticated(&self, bundle: &CredentialBundle) -> bool {
        self.check_auth(bundle).await.is_authenticated()
    }

    /// Create or update the remote copy of `event`.
    ///
    /// Updates address `event.remote_event_id`; if the provider no longer has
    /// it, a new remote event is created and the old id is reported in
    /// [`RemoteEvent::replaced`].
    ///
    /// # Errors
    /// Any provider failure other than the not-found fallback.
    async fn sync_event(
        &self,
        bundle: &CredentialBundle,
        event: &Event,
    ) -> Result<RemoteEvent, ProviderError>;

    /// Delete the remote copy. A remote event that is already gone counts as
    /// deleted.
    ///
    /// # Errors
    /// Any provider failure other than not-found.
    async fn remove_event(
        &self,
        bundle: &CredentialBundle,
        remote_event_id: &str,
    ) -> Result<(), ProviderError>;

    /// Best-effort remote delete; any failure yields `false`.
    async fn delete_event(&self, bundle: &CredentialBundle, remote_event_id: &str) -> bool {
        match self.remove_event(bundle, remote_event_id).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    "Failed to delete {} event {}: {}",
                    self.provider(),
                    remote_event_id,
                    e
                );
                false
            }
        }
    }

    /// Outbound mail capability, if this provider has one
    fn message_sender(&self) -> Option<&dyn MessageSender> {
        None
    }
}

/// Outbound email as handed to a provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub subject: String,
    pub body: String,
    pub recipient: String,
}

impl OutboundMessage {
    /// Escalate an internal message to its receiver's mailbox
    pub fn leadership_query(message: &Message, recipient: &str) -> Self {
        Self {
            subject: format!("Leadership Query: {}", message.subject),
            body: message.content.clone(),
            recipient: recipient.to_string(),
        }
    }
}

#[async_trait]
pub trait MessageSender: Send + Sync {
    /// # Errors
    /// Returns the provider failure unchanged; mail is a user-facing path.
    async fn send_message(
        &self,
        bundle: &CredentialBundle,
        message: &OutboundMessage,
    ) -> Result<(), ProviderError>;
}

/// Shared silent-refresh policy for adapters backed by an OAuth refresher.
pub(crate) async fn check_with_refresher(
    refresher: &dyn TokenRefresher,
    bundle: &CredentialBundle,
) -> AuthCheck {
    if bundle.access_token.is_empty() {
        return AuthCheck::Invalid("bundle has no access token".to_string());
    }

    if !bundle.needs_refresh() {
        return AuthCheck::Valid;
    }

    if !bundle.can_refresh() {
        return if bundle.is_expired() {
            AuthCheck::Invalid("access token expired and no refresh token".to_string())
        } else {
            AuthCheck::Valid
        };
    }

    renew_with_refresher(refresher, bundle).await
}

/// Refresh regardless of the recorded expiry.
pub(crate) async fn renew_with_refresher(
    refresher: &dyn TokenRefresher,
    bundle: &CredentialBundle,
) -> AuthCheck {
    if !bundle.can_refresh() {
        return AuthCheck::Invalid("access token rejected and no refresh token".to_string());
    }

    match refresher.refresh(bundle).await {
        Ok(renewed) => {
            tracing::debug!("Silently refreshed {} access token", refresher.provider());
            AuthCheck::Renewed(renewed)
        }
        Err(e) => {
            tracing::warn!("{} token refresh failed: {}", refresher.provider(), e);
            AuthCheck::Invalid(e.to_string())
        }
    }
}

/// Contact addresses of the event's attendees, in order, without duplicates.
/// Attendees with no usable address are skipped.
pub(crate) fn attendee_addresses(event: &Event) -> Vec<&str> {
    let mut seen: Vec<&str> = Vec::with_capacity(event.attendees.len());
    for attendee in &event.attendees {
        match attendee.contact_address() {
            Some(address) if !seen.iter().any(|s| s.eq_ignore_ascii_case(address)) => {
                seen.push(address)
            }
            Some(_) => {}
            None => tracing::debug!(
                "Skipping attendee {} on event {}: no contact address",
                attendee.id,
                event.id
            ),
        }
    }
    seen
}
