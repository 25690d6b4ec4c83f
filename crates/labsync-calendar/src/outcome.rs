//! Structured results of sync attempts and the sinks that observe them.

use labsync_core::{ActorId, Provider};
use parking_lot::Mutex;

use crate::error::FailureKind;

/// Lifecycle transition that triggered a sync
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOperation {
    Created,
    Updated,
    Deleted,
}

impl SyncOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncOperation::Created => "created",
            SyncOperation::Updated => "updated",
            SyncOperation::Deleted => "deleted",
        }
    }
}

impl std::fmt::Display for SyncOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Owner never connected this provider
    NotConnected,
    /// Owner's credentials are no longer valid and could not be renewed
    AuthExpired,
    /// Sync is switched off in configuration
    Disabled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncFailure {
    /// Provider call failed; remote fields on the event were left untouched
    Provider { kind: FailureKind, message: String },
    /// Credential store could not be read
    Credentials(String),
    /// Remote copy exists but its id could not be written back locally
    WriteBack { remote_event_id: String, message: String },
    /// Remote delete was attempted and did not succeed
    DeleteFailed { remote_event_id: String },
}

impl std::fmt::Display for SyncFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncFailure::Provider { kind, message } => {
                write!(f, "provider failure ({:?}): {}", kind, message)
            }
            SyncFailure::Credentials(msg) => write!(f, "credential store: {}", msg),
            SyncFailure::WriteBack { remote_event_id, message } => {
                write!(f, "could not record remote id {}: {}", remote_event_id, message)
            }
            SyncFailure::DeleteFailed { remote_event_id } => {
                write!(f, "remote delete of {} failed", remote_event_id)
            }
        }
    }
}

/// Outcome of one `reconcile` call. Advisory only; never an error for the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Synced {
        remote_event_id: String,
        remote_link: Option<String>,
        /// Stale remote id replaced after a not-found on update
        replaced: Option<String>,
    },
    Deleted {
        remote_event_id: String,
    },
    /// Nothing to do (delete of an event that was never synced)
    NoOp,
    Skipped(SkipReason),
    Failed(SyncFailure),
}

impl SyncOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Synced { .. } | Self::Deleted { .. } | Self::NoOp)
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// Remote id now associated with the event, if this outcome produced one
    pub fn remote_event_id(&self) -> Option<&str> {
        match self {
            Self::Synced { remote_event_id, .. } => Some(remote_event_id),
            _ => None,
        }
    }
}

/// One completed sync attempt, as reported to an [`OutcomeSink`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncAttempt {
    pub event_id: i64,
    pub actor: ActorId,
    pub provider: Provider,
    pub operation: SyncOperation,
    pub outcome: SyncOutcome,
}

/// Observability hook for sync outcomes
pub trait OutcomeSink: Send + Sync {
    fn record(&self, attempt: &SyncAttempt);
}

/// Default sink: structured log lines
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl OutcomeSink for TracingSink {
    fn record(&self, attempt: &SyncAttempt) {
        let SyncAttempt { event_id, actor, provider, operation, outcome } = attempt;
        match outcome {
            SyncOutcome::Synced { remote_event_id, replaced: Some(stale), .. } => tracing::info!(
                event_id,
                %actor,
                %provider,
                %operation,
                "Event synced; stale remote id {} replaced by {}",
                stale,
                remote_event_id
            ),
            SyncOutcome::Synced { remote_event_id, .. } => tracing::info!(
                event_id,
                %actor,
                %provider,
                %operation,
                "Event synced as {}",
                remote_event_id
            ),
            SyncOutcome::Deleted { remote_event_id } => tracing::info!(
                event_id,
                %provider,
                "Remote event {} deleted",
                remote_event_id
            ),
            SyncOutcome::NoOp => tracing::debug!(event_id, %operation, "Nothing to sync"),
            SyncOutcome::Skipped(reason) => tracing::debug!(
                event_id,
                %actor,
                %provider,
                %operation,
                "Sync skipped: {:?}",
                reason
            ),
            SyncOutcome::Failed(failure) => tracing::warn!(
                event_id,
                %actor,
                %provider,
                %operation,
                "Sync failed: {}",
                failure
            ),
        }
    }
}

/// Keeps every attempt in memory for inspection
#[derive(Debug, Default)]
pub struct RecordingSink {
    attempts: Mutex<Vec<SyncAttempt>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attempts(&self) -> Vec<SyncAttempt> {
        self.attempts.lock().clone()
    }

    pub fn last(&self) -> Option<SyncAttempt> {
        self.attempts.lock().last().cloned()
    }

    pub fn failures(&self) -> Vec<SyncAttempt> {
        self.attempts
            .lock()
            .iter()
            .filter(|a| a.outcome.is_failed())
            .cloned()
            .collect()
    }
}

impl OutcomeSink for RecordingSink {
    fn record(&self, attempt: &SyncAttempt) {
        self.attempts.lock().push(attempt.clone());
    }
}
