//! Google Calendar API request/response shapes.

use chrono::{DateTime, SecondsFormat, Utc};
use labsync_services::Event;
use serde::{Deserialize, Serialize};

use crate::adapter::attendee_addresses;

/// Event body for insert and patch requests.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventBody {
    pub summary: String,
    pub description: String,
    pub location: String,
    pub start: ApiEventTime,
    pub end: ApiEventTime,
    pub attendees: Vec<ApiAttendee>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiEventTime {
    pub date_time: Option<String>,
    pub time_zone: Option<String>,
}

impl ApiEventTime {
    /// RFC 3339 with a `Z` suffix plus an explicit zone name
    pub fn utc(at: DateTime<Utc>) -> Self {
        Self {
            date_time: Some(at.to_rfc3339_opts(SecondsFormat::Secs, true)),
            time_zone: Some("UTC".to_string()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiAttendee {
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_status: Option<String>,
}

impl EventBody {
    pub fn from_event(event: &Event) -> Self {
        let mut description = event.description.clone();
        if !event.category.is_empty() {
            if !description.is_empty() {
                description.push_str("\n\n");
            }
            description.push_str(&format!(
                "Category: {} | Stage: {}",
                event.category,
                event.pipeline_stage.as_str()
            ));
        }

        Self {
            summary: event.title.clone(),
            description,
            location: event.location.clone(),
            start: ApiEventTime::utc(event.start),
            end: ApiEventTime::utc(event.end),
            attendees: attendee_addresses(event)
                .into_iter()
                .map(|email| ApiAttendee {
                    email: email.to_string(),
                    response_status: None,
                })
                .collect(),
        }
    }
}

/// Google Calendar API event response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiEvent {
    pub id: String,
    pub summary: Option<String>,
    pub html_link: Option<String>,
    pub status: Option<String>,
    pub etag: Option<String>,
}
