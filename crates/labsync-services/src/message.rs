// crates/labsync-services/src/message.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event::Actor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    #[default]
    Pending,
    Replied,
    Archived,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MessagePriority {
    #[default]
    Normal,
    High,
    Urgent,
}

/// Internal message between two actors, optionally tied to a project
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub sender: Actor,
    pub receiver: Actor,
    pub project: Option<i64>,
    pub subject: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub status: MessageStatus,
    #[serde(default)]
    pub priority: MessagePriority,
    pub parent: Option<i64>,
}

impl Message {
    /// Whether `actor` is allowed to see this message
    pub fn is_visible_to(&self, actor: &Actor) -> bool {
        self.sender.id == actor.id || self.receiver.id == actor.id
    }
}
