use async_trait::async_trait;
use labsync_auth::{CredentialBundle, GoogleOAuth2Provider};
use labsync_core::{GoogleConfig, Provider};
use labsync_services::Event;

use super::client::GoogleCalendarClient;
use super::types::EventBody;
use crate::adapter::{
    check_with_refresher, renew_with_refresher, AuthCheck, CalendarAdapter, RemoteEvent,
};
use crate::error::{FailureKind, ProviderError};

/// Google Calendar implementation of [`CalendarAdapter`]
pub struct GoogleCalendarAdapter {
    http: reqwest::Client,
    api_base: String,
    calendar_id: String,
    oauth: GoogleOAuth2Provider,
}

impl GoogleCalendarAdapter {
    pub fn new(config: &GoogleConfig, http: reqwest::Client) -> Self {
        Self {
            oauth: GoogleOAuth2Provider::from_config(config, http.clone()),
            api_base: config.api_base.clone(),
            calendar_id: config.calendar_id.clone(),
            http,
        }
    }

    fn client(&self, bundle: &CredentialBundle) -> GoogleCalendarClient {
        GoogleCalendarClient::with_client(self.http.clone(), &self.api_base, &bundle.access_token)
    }
}

#[async_trait]
impl CalendarAdapter for GoogleCalendarAdapter {
    fn provider(&self) -> Provider {
        Provider::Google
    }

    async fn check_auth(&self, bundle: &CredentialBundle) -> AuthCheck {
        check_with_refresher(&self.oauth, bundle).await
    }

    async fn renew(&self, bundle: &CredentialBundle) -> AuthCheck {
        renew_with_refresher(&self.oauth, bundle).await
    }

    async fn sync_event(
        &self,
        bundle: &CredentialBundle,
        event: &Event,
    ) -> Result<RemoteEvent, ProviderError> {
        let client = self.client(bundle);
        let body = EventBody::from_event(event);

        let mut replaced = None;
        if let Some(remote_id) = event.remote_event_id.as_deref() {
            match client.patch_event(&self.calendar_id, remote_id, &body).await {
                Ok(api) => {
                    return Ok(RemoteEvent { id: api.id, link: api.html_link, replaced: None });
                }
                Err(e) if e.kind() == FailureKind::RemoteNotFound => {
                    tracing::info!(
                        "Google event {} for event {} no longer exists; recreating",
                        remote_id,
                        event.id
                    );
                    replaced = Some(remote_id.to_string());
                }
                Err(e) => return Err(e),
            }
        }

        let api = client.insert_event(&self.calendar_id, &body).await?;
        Ok(RemoteEvent { id: api.id, link: api.html_link, replaced })
    }

    async fn remove_event(
        &self,
        bundle: &CredentialBundle,
        remote_event_id: &str,
    ) -> Result<(), ProviderError> {
        match self.client(bundle).delete_event(&self.calendar_id, remote_event_id).await {
            Err(e) if e.kind() == FailureKind::RemoteNotFound => {
                tracing::debug!("Google event {} already gone", remote_event_id);
                Ok(())
            }
            result => result,
        }
    }
}
