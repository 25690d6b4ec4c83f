//! Google Calendar API client.

use tracing::instrument;

use super::types::{ApiEvent, EventBody};
use crate::error::ProviderError;

pub struct GoogleCalendarClient {
    client: reqwest::Client,
    access_token: String,
    base_url: String,
}

impl GoogleCalendarClient {
    /// Reuse a configured HTTP client (timeouts, pooling) against `base_url`.
    pub fn with_client(client: reqwest::Client, base_url: &str, access_token: &str) -> Self {
        Self {
            client,
            access_token: access_token.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn auth_header(&self) -> String {
        format!("Bearer {}", self.access_token)
    }

    fn events_url(&self, calendar_id: &str) -> String {
        format!(
            "{}/calendars/{}/events",
            self.base_url,
            urlencoding::encode(calendar_id)
        )
    }

    /// Create a new event and invite its attendees.
    #[instrument(skip(self, body), level = "info")]
    pub async fn insert_event(
        &self,
        calendar_id: &str,
        body: &EventBody,
    ) -> Result<ApiEvent, ProviderError> {
        let url = format!("{}?sendUpdates=all", self.events_url(calendar_id));

        let response = self
            .client
            .post(&url)
            .header("Authorization", self.auth_header())
            .json(body)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Patch an existing event.
    #[instrument(skip(self, body), level = "info")]
    pub async fn patch_event(
        &self,
        calendar_id: &str,
        event_id: &str,
        body: &EventBody,
    ) -> Result<ApiEvent, ProviderError> {
        let url = format!(
            "{}/{}?sendUpdates=all",
            self.events_url(calendar_id),
            urlencoding::encode(event_id),
        );

        let response = self
            .client
            .patch(&url)
            .header("Authorization", self.auth_header())
            .json(body)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Delete an event.
    #[instrument(skip(self), level = "info")]
    pub async fn delete_event(&self, calendar_id: &str, event_id: &str) -> Result<(), ProviderError> {
        let url = format!(
            "{}/{}?sendUpdates=all",
            self.events_url(calendar_id),
            urlencoding::encode(event_id),
        );

        let response = self
            .client
            .delete(&url)
            .header("Authorization", self.auth_header())
            .send()
            .await?;

        // Delete returns 204 No Content on success
        if response.status().is_success() {
            Ok(())
        } else {
            Err(ProviderError::from_response(response).await)
        }
    }

    /// Helper to handle API responses and errors.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ProviderError> {
        if response.status().is_success() {
            response.json().await.map_err(|e| ProviderError::Api {
                status: 200,
                message: format!("JSON parse error: {}", e),
            })
        } else {
            Err(ProviderError::from_response(response).await)
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;
    use super::super::types::ApiEventTime;
    use chrono::{TimeZone, Utc};
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn body() -> EventBody {
        let at = Utc.with_ymd_and_hms(2025, 2, 1, 14, 0, 0).unwrap();
        EventBody {
            summary: "Team Sync".to_string(),
            description: String::new(),
            location: String::new(),
            start: ApiEventTime::utc(at),
            end: ApiEventTime::utc(at),
            attendees: vec![],
        }
    }

    #[tokio::test]
    async fn test_insert_event() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/calendars/primary/events"))
            .and(query_param("sendUpdates", "all"))
            .and(header("Authorization", "Bearer test_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "event123",
                "summary": "Team Sync",
                "htmlLink": "https://calendar.google.com/event?eid=event123"
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = GoogleCalendarClient::with_client(
            reqwest::Client::new(),
            &mock_server.uri(),
            "test_token",
        );
        let event = client.insert_event("primary", &body()).await.unwrap();

        assert_eq!(event.id, "event123");
        assert!(event.html_link.is_some());
    }

    #[tokio::test]
    async fn test_patch_missing_event_is_not_found() {
        let mock_server = MockServer::start().await;

        Mock::given(method("PATCH"))
            .and(path("/calendars/primary/events/gone"))
            .respond_with(ResponseTemplate::new(404).set_body_string("Not Found"))
            .mount(&mock_server)
            .await;

        let client = GoogleCalendarClient::with_client(
            reqwest::Client::new(),
            &mock_server.uri(),
            "test_token",
        );
        let result = client.patch_event("primary", "gone", &body()).await;

        assert!(matches!(result, Err(ProviderError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_token_expired() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/calendars/primary/events"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&mock_server)
            .await;

        let client = GoogleCalendarClient::with_client(
            reqwest::Client::new(),
            &mock_server.uri(),
            "expired_token",
        );
        let result = client.insert_event("primary", &body()).await;

        assert!(matches!(result, Err(ProviderError::TokenExpired)));
    }

    #[tokio::test]
    async fn test_rate_limited() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/calendars/primary/events"))
            .respond_with(ResponseTemplate::new(429).append_header("Retry-After", "60"))
            .mount(&mock_server)
            .await;

        let client =
            GoogleCalendarClient::with_client(reqwest::Client::new(), &mock_server.uri(), "token");
        let result = client.insert_event("primary", &body()).await;

        assert!(matches!(result, Err(ProviderError::RateLimited(60))));
    }

    #[tokio::test]
    async fn test_delete_event() {
        let mock_server = MockServer::start().await;

        Mock::given(method("DELETE"))
            .and(path("/calendars/primary/events/event123"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&mock_server)
            .await;

        let client = GoogleCalendarClient::with_client(
            reqwest::Client::new(),
            &mock_server.uri(),
            "test_token",
        );

        assert!(client.delete_event("primary", "event123").await.is_ok());
    }

    #[tokio::test]
    async fn test_delete_already_deleted_is_gone() {
        let mock_server = MockServer::start().await;

        Mock::given(method("DELETE"))
            .and(path("/calendars/primary/events/event123"))
            .respond_with(ResponseTemplate::new(410))
            .mount(&mock_server)
            .await;

        let client = GoogleCalendarClient::with_client(
            reqwest::Client::new(),
            &mock_server.uri(),
            "test_token",
        );
        let result = client.delete_event("primary", "event123").await;

        assert!(matches!(result, Err(ProviderError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_slow_provider_times_out() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/calendars/primary/events"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(std::time::Duration::from_millis(500))
                    .set_body_json(serde_json::json!({"id": "late"})),
            )
            .mount(&mock_server)
            .await;

        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(50))
            .build()
            .unwrap();
        let client = GoogleCalendarClient::with_client(http, &mock_server.uri(), "token");
        let result = client.insert_event("primary", &body()).await;

        assert!(matches!(result, Err(ProviderError::Timeout)));
    }
}
