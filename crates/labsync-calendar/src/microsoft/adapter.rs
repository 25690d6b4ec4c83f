use async_trait::async_trait;
use labsync_auth::{CredentialBundle, MicrosoftOAuth2Provider};
use labsync_core::{MicrosoftConfig, Provider};
use labsync_services::Event;

use super::client::GraphClient;
use super::types::{GraphEventBody, SendMailRequest};
use crate::adapter::{
    check_with_refresher, renew_with_refresher, AuthCheck, CalendarAdapter, MessageSender,
    OutboundMessage, RemoteEvent,
};
use crate::error::{FailureKind, ProviderError};

/// Outlook calendar via Microsoft Graph; also the only provider that can send mail
pub struct MicrosoftGraphAdapter {
    http: reqwest::Client,
    graph_base: String,
    oauth: MicrosoftOAuth2Provider,
}

impl MicrosoftGraphAdapter {
    pub fn new(config: &MicrosoftConfig, http: reqwest::Client) -> Self {
        Self {
            oauth: MicrosoftOAuth2Provider::from_config(config, http.clone()),
            graph_base: config.graph_base.clone(),
            http,
        }
    }

    fn client(&self, bundle: &CredentialBundle) -> GraphClient {
        GraphClient::with_client(self.http.clone(), &self.graph_base, &bundle.access_token)
    }
}

#[async_trait]
impl CalendarAdapter for MicrosoftGraphAdapter {
    fn provider(&self) -> Provider {
        Provider::Microsoft
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
        let body = GraphEventBody::from_event(event);

        let replaced = match event.remote_event_id.as_deref() {
            Some(remote_id) => match client.update_event(remote_id, &body).await {
                Ok(graph) => {
                    return Ok(RemoteEvent { id: graph.id, link: graph.web_link, replaced: None })
                }
                Err(e) if e.kind() == FailureKind::RemoteNotFound => {
                    tracing::info!(
                        "Outlook event {} for event {} no longer exists; recreating",
                        remote_id,
                        event.id
                    );
                    Some(remote_id.to_string())
                }
                Err(e) => return Err(e),
            },
            None => None,
        };

        let graph = client.create_event(&body).await?;
        Ok(RemoteEvent { id: graph.id, link: graph.web_link, replaced })
    }

    async fn remove_event(
        &self,
        bundle: &CredentialBundle,
        remote_event_id: &str,
    ) -> Result<(), ProviderError> {
        match self.client(bundle).delete_event(remote_event_id).await {
            Err(e) if e.kind() == FailureKind::RemoteNotFound => {
                tracing::debug!("Outlook event {} already gone", remote_event_id);
                Ok(())
            }
            result => result,
        }
    }

    fn message_sender(&self) -> Option<&dyn MessageSender> {
        Some(self)
    }
}

#[async_trait]
impl MessageSender for MicrosoftGraphAdapter {
    async fn send_message(
        &self,
        bundle: &CredentialBundle,
        message: &OutboundMessage,
    ) -> Result<(), ProviderError> {
        self.client(bundle)
            .send_mail(&SendMailRequest::from(message))
            .await?;
        tracing::info!("Sent mail \"{}\" via Outlook", message.subject);
        Ok(())
    }
}
