//! Event lifecycle call sites.
//!
//! The local write always completes (or fails) on its own terms; the sync
//! that follows can only ever add an advisory [`SyncOutcome`].

use std::sync::Arc;

use labsync_services::{Event, EventBackend, EventBackendError, EventBackendResult, EventPatch, NewEvent};

use crate::orchestrator::SyncOrchestrator;
use crate::outcome::{SyncOperation, SyncOutcome};

/// A local result plus what happened when it was pushed to the provider
#[derive(Debug, Clone)]
pub struct Synced<T> {
    pub value: T,
    pub sync: SyncOutcome,
}

pub struct EventLifecycle {
    events: Arc<dyn EventBackend>,
    orchestrator: Arc<SyncOrchestrator>,
}

impl EventLifecycle {
    pub fn new(events: Arc<dyn EventBackend>, orchestrator: Arc<SyncOrchestrator>) -> Self {
        Self { events, orchestrator }
    }

    pub fn events(&self) -> &Arc<dyn EventBackend> {
        &self.events
    }

    /// Insert locally, then sync.
    ///
    /// # Errors
    /// Only local storage errors; sync problems are reported in `sync`.
    pub async fn create(&self, event: NewEvent) -> EventBackendResult<Synced<Event>> {
        let created = self.events.create(event)?;
        tracing::debug!("Created event {}", created.id);
        Ok(self.after_write(created, SyncOperation::Created).await)
    }

    /// Apply a partial update locally, then sync.
    ///
    /// # Errors
    /// Only local storage errors; sync problems are reported in `sync`.
    pub async fn update(&self, id: i64, patch: EventPatch) -> EventBackendResult<Synced<Event>> {
        let updated = self.events.update(id, patch)?;
        Ok(self.after_write(updated, SyncOperation::Updated).await)
    }

    /// Attempt the remote delete, then delete locally regardless of its result.
    ///
    /// # Errors
    /// `NotFound` if the event doesn't exist, or a local storage error.
    pub async fn delete(&self, id: i64) -> EventBackendResult<SyncOutcome> {
        let event = self
            .events
            .get(id)?
            .ok_or_else(|| EventBackendError::not_found(id.to_string()))?;

        let sync = self.orchestrator.reconcile(&event, SyncOperation::Deleted).await;
        self.events.delete(id)?;
        Ok(sync)
    }

    async fn after_write(&self, mut event: Event, operation: SyncOperation) -> Synced<Event> {
        let sync = self.orchestrator.reconcile(&event, operation).await;

        // Mirror what the orchestrator wrote back so callers see the stored state
        if let SyncOutcome::Synced { remote_event_id, remote_link, .. } = &sync {
            event.remote_event_id = Some(remote_event_id.clone());
            event.remote_link = remote_link.clone();
        }

        Synced { value: event, sync }
    }
}
