// crates/labsync-services/src/event.rs

use chrono::{DateTime, Utc};
use labsync_core::ActorId;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Organisational role of an actor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Role {
    Director,
    #[serde(rename = "Deputy Director")]
    DeputyDirector,
    #[default]
    #[serde(rename = "Research Assistant")]
    ResearchAssistant,
    Admin,
    #[serde(rename = "Innovation Officer")]
    InnovationOfficer,
    #[serde(rename = "Data Analyst")]
    DataAnalyst,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Director => "Director",
            Role::DeputyDirector => "Deputy Director",
            Role::ResearchAssistant => "Research Assistant",
            Role::Admin => "Admin",
            Role::InnovationOfficer => "Innovation Officer",
            Role::DataAnalyst => "Data Analyst",
        }
    }

    /// Parse a stored role name; unknown names fall back to the default role
    pub fn from_stored(s: &str) -> Self {
        match s {
            "Director" => Role::Director,
            "Deputy Director" => Role::DeputyDirector,
            "Admin" => Role::Admin,
            "Innovation Officer" => Role::InnovationOfficer,
            "Data Analyst" => Role::DataAnalyst,
            _ => Role::ResearchAssistant,
        }
    }
}

/// A local user account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Actor {
    pub id: ActorId,
    pub username: String,
    pub email: Option<String>,
    #[serde(default)]
    pub role: Role,
}

impl Actor {
    pub fn new(id: i64, username: impl Into<String>, email: Option<&str>) -> Self {
        Self {
            id: ActorId(id),
            username: username.into(),
            email: email.map(str::to_string),
            role: Role::default(),
        }
    }

    /// Address usable as a calendar attendee or mail recipient, if any
    pub fn contact_address(&self) -> Option<&str> {
        self.email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty() && e.contains('@'))
    }
}

/// Event pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PipelineStage {
    #[default]
    Planning,
    Confirmed,
    #[serde(rename = "In Progress")]
    InProgress,
    Completed,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Planning => "Planning",
            PipelineStage::Confirmed => "Confirmed",
            PipelineStage::InProgress => "In Progress",
            PipelineStage::Completed => "Completed",
        }
    }
}

impl FromStr for PipelineStage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Planning" => Ok(PipelineStage::Planning),
            "Confirmed" => Ok(PipelineStage::Confirmed),
            "In Progress" => Ok(PipelineStage::InProgress),
            "Completed" => Ok(PipelineStage::Completed),
            other => Err(format!("unknown pipeline stage: {}", other)),
        }
    }
}

/// Locally owned scheduling entity.
///
/// `remote_event_id` is set only after the first successful provider sync and
/// always refers to a remote resource created for this event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub location: String,
    pub category: String,
    pub pipeline_stage: PipelineStage,
    pub owner: Actor,
    pub attendees: Vec<Actor>,
    pub max_attendees: Option<u32>,
    pub linked_project: Option<i64>,
    pub remote_event_id: Option<String>,
    pub remote_link: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    pub fn is_synced(&self) -> bool {
        self.remote_event_id.is_some()
    }
}

/// Request to create an event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewEvent {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub location: String,
    pub category: String,
    #[serde(default)]
    pub pipeline_stage: PipelineStage,
    pub owner: ActorId,
    #[serde(default)]
    pub attendees: Vec<ActorId>,
    pub max_attendees: Option<u32>,
    pub linked_project: Option<i64>,
}

/// Partial update; only `Some` fields are applied
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub category: Option<String>,
    pub pipeline_stage: Option<PipelineStage>,
    pub attendees: Option<Vec<ActorId>>,
    pub max_attendees: Option<u32>,
    pub linked_project: Option<i64>,
}

/// Validate the scheduling fields shared by create and update
pub fn validate_schedule(
    title: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    attendee_count: usize,
    max_attendees: Option<u32>,
) -> Result<(), String> {
    if title.trim().is_empty() {
        return Err("Title cannot be empty".to_string());
    }
    if end < start {
        return Err("Event cannot end before it starts".to_string());
    }
    if let Some(max) = max_attendees {
        if attendee_count > max as usize {
            return Err(format!(
                "Event allows at most {} attendees, got {}",
                max, attendee_count
            ));
        }
    }
    Ok(())
}
