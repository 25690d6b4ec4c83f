//! Calendar synchronization for labsync.
//!
//! Local events are pushed to one configured provider (Google Calendar or
//! Microsoft Graph) after every local write. Sync is best-effort: it never
//! blocks or fails the write that triggered it, and reports what happened as
//! a [`SyncOutcome`].

pub mod adapter;
pub mod error;
pub mod google;
pub mod hooks;
pub mod messaging;
pub mod microsoft;
pub mod orchestrator;
pub mod outcome;
pub mod service;

pub use adapter::{AuthCheck, CalendarAdapter, MessageSender, OutboundMessage, RemoteEvent};
pub use error::{FailureKind, ProviderError};
pub use google::GoogleCalendarAdapter;
pub use hooks::{EventLifecycle, Synced};
pub use messaging::{MessagingError, Messenger};
pub use microsoft::MicrosoftGraphAdapter;
pub use orchestrator::SyncOrchestrator;
pub use outcome::{
    OutcomeSink, RecordingSink, SkipReason, SyncAttempt, SyncFailure, SyncOperation, SyncOutcome,
    TracingSink,
};
pub use service::SyncService;
