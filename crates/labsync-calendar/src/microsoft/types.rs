//! Microsoft Graph request/response shapes for events and mail.

use chrono::{DateTime, Utc};
use labsync_services::Event;
use serde::{Deserialize, Serialize};

use crate::adapter::{attendee_addresses, OutboundMessage};

/// Graph `dateTimeTimeZone`; the zone travels in its own field
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateTimeTimeZone {
    pub date_time: String,
    pub time_zone: String,
}

impl DateTimeTimeZone {
    pub fn utc(at: DateTime<Utc>) -> Self {
        Self {
            date_time: at.format("%Y-%m-%dT%H:%M:%S").to_string(),
            time_zone: "UTC".to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemBody {
    pub content_type: String,
    pub content: String,
}

impl ItemBody {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content_type: "text".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EmailAddress {
    pub address: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipient {
    pub email_address: EmailAddress,
}

impl Recipient {
    pub fn new(address: &str) -> Self {
        Self {
            email_address: EmailAddress {
                address: address.to_string(),
            },
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphAttendee {
    pub email_address: EmailAddress,
    #[serde(rename = "type")]
    pub attendee_type: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphLocation {
    pub display_name: String,
}

/// Event body for create and update requests.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphEventBody {
    pub subject: String,
    pub body: ItemBody,
    pub start: DateTimeTimeZone,
    pub end: DateTimeTimeZone,
    pub location: GraphLocation,
    pub attendees: Vec<GraphAttendee>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,
}

impl GraphEventBody {
    pub fn from_event(event: &Event) -> Self {
        Self {
            subject: event.title.clone(),
            body: ItemBody::text(event.description.clone()),
            start: DateTimeTimeZone::utc(event.start),
            end: DateTimeTimeZone::utc(event.end),
            location: GraphLocation {
                display_name: event.location.clone(),
            },
            attendees: attendee_addresses(event)
                .into_iter()
                .map(|address| GraphAttendee {
                    email_address: EmailAddress {
                        address: address.to_string(),
                    },
                    attendee_type: "required".to_string(),
                })
                .collect(),
            categories: if event.category.is_empty() {
                Vec::new()
            } else {
                vec![event.category.clone()]
            },
        }
    }
}

/// Graph event response (only the fields sync needs)
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphEvent {
    pub id: String,
    pub subject: Option<String>,
    pub web_link: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MailMessage {
    pub subject: String,
    pub body: ItemBody,
    pub to_recipients: Vec<Recipient>,
}

/// Body of `POST /me/sendMail`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMailRequest {
    pub message: MailMessage,
    pub save_to_sent_items: bool,
}

impl From<&OutboundMessage> for SendMailRequest {
    fn from(message: &OutboundMessage) -> Self {
        Self {
            message: MailMessage {
                subject: message.subject.clone(),
                body: ItemBody::text(message.body.clone()),
                to_recipients: vec![Recipient::new(&message.recipient)],
            },
            save_to_sent_items: true,
        }
    }
}
