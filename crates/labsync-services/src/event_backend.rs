//! Event storage backend trait and error types.
//!
//! `EventBackend` is the local write path for events. Calendar sync sits on
//! top of it and only ever touches the remote identifier columns through
//! [`EventBackend::set_remote`].

use labsync_core::ActorId;
use thiserror::Error;

use crate::event::{Actor, Event, EventPatch, NewEvent};

/// Errors that can occur during event backend operations.
#[derive(Debug, Error)]
pub enum EventBackendError {
    /// Event or actor was not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Validation error (empty title, end before start, too many attendees).
    #[error("Validation error: {0}")]
    Validation(String),

    /// Storage error (database, constraint violation).
    #[error("Storage error: {0}")]
    Storage(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl EventBackendError {
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound(id.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }
}

impl From<rusqlite::Error> for EventBackendError {
    fn from(e: rusqlite::Error) -> Self {
        use labsync_core::RusqliteErrorExt;
        Self::Storage(e.into_database_error().to_string())
    }
}

/// Result type for event backend operations.
pub type EventBackendResult<T> = Result<T, EventBackendError>;

/// Trait for event storage backends.
///
/// Implementations must be shareable across request handlers.
pub trait EventBackend: Send + Sync {
    /// Insert or replace an actor record.
    fn upsert_actor(&self, actor: &Actor) -> EventBackendResult<()>;

    /// Get an actor by ID.
    fn get_actor(&self, id: ActorId) -> EventBackendResult<Option<Actor>>;

    /// Create a new event. Owner and attendees must already exist.
    ///
    /// # Errors
    /// Returns `EventBackendError::Validation` if the schedule is invalid or an
    /// actor is unknown.
    fn create(&self, event: NewEvent) -> EventBackendResult<Event>;

    /// Get an event by ID with owner and attendees resolved.
    fn get(&self, id: i64) -> EventBackendResult<Option<Event>>;

    /// List all events ordered by start time.
    fn list(&self) -> EventBackendResult<Vec<Event>>;

    /// Apply a partial update. Remote identifiers are never touched here.
    ///
    /// # Errors
    /// Returns `EventBackendError::NotFound` if the event doesn't exist.
    fn update(&self, id: i64, patch: EventPatch) -> EventBackendResult<Event>;

    /// Delete an event and its attendee links.
    ///
    /// # Errors
    /// Returns `EventBackendError::NotFound` if the event doesn't exist.
    fn delete(&self, id: i64) -> EventBackendResult<()>;

    /// Record the provider-side identity of an event after a successful sync.
    fn set_remote(
        &self,
        id: i64,
        remote_event_id: &str,
        remote_link: Option<&str>,
    ) -> EventBackendResult<()>;
}
