//! Local resource layer: actors, events and messages.

pub mod event;
pub mod event_backend;
pub mod event_store;
pub mod message;

pub use event::{validate_schedule, Actor, Event, EventPatch, NewEvent, PipelineStage, Role};
pub use event_backend::{EventBackend, EventBackendError, EventBackendResult};
pub use event_store::SqliteEventStore;
pub use message::{Message, MessagePriority, MessageStatus};
