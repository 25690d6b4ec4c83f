//! Microsoft Graph API client for `/me/events` and `/me/sendMail`.

use tracing::instrument;

use super::types::{GraphEvent, GraphEventBody, SendMailRequest};
use crate::error::ProviderError;

const OUTLOOK_TIMEZONE_HEADER: &str = r#"outlook.timezone="UTC""#;

pub struct GraphClient {
    client: reqwest::Client,
    access_token: String,
    base_url: String,
}

impl GraphClient {
    pub fn with_client(client: reqwest::Client, base_url: &str, access_token: &str) -> Self {
        Self {
            client,
            access_token: access_token.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn event_url(&self, event_id: &str) -> String {
        format!("{}/me/events/{}", self.base_url, urlencoding::encode(event_id))
    }

    #[instrument(skip(self, body), level = "info")]
    pub async fn create_event(&self, body: &GraphEventBody) -> Result<GraphEvent, ProviderError> {
        let url = format!("{}/me/events", self.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .header("Prefer", OUTLOOK_TIMEZONE_HEADER)
            .json(body)
            .send()
            .await?;

        self.handle_response(response).await
    }

    #[instrument(skip(self, body), level = "info")]
    pub async fn update_event(
        &self,
        event_id: &str,
        body: &GraphEventBody,
    ) -> Result<GraphEvent, ProviderError> {
        let response = self
            .client
            .patch(self.event_url(event_id))
            .bearer_auth(&self.access_token)
            .header("Prefer", OUTLOOK_TIMEZONE_HEADER)
            .json(body)
            .send()
            .await?;

        self.handle_response(response).await
    }

    #[instrument(skip(self), level = "info")]
    pub async fn delete_event(&self, event_id: &str) -> Result<(), ProviderError> {
        let response = self
            .client
            .delete(self.event_url(event_id))
            .bearer_auth(&self.access_token)
            .send()
            .await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(ProviderError::from_response(response).await)
        }
    }

    /// Send mail as the signed-in user. Graph answers 202 with no body.
    #[instrument(skip(self, request), level = "info")]
    pub async fn send_mail(&self, request: &SendMailRequest) -> Result<(), ProviderError> {
        let url = format!("{}/me/sendMail", self.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(request)
            .send()
            .await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(ProviderError::from_response(response).await)
        }
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ProviderError> {
        if response.status().is_success() {
            response.json().await.map_err(|e| ProviderError::Api {
                status: 200,
                message: format!("Failed to parse Graph response: {}", e),
            })
        } else {
            Err(ProviderError::from_response(response).await)
        }
    }
}
