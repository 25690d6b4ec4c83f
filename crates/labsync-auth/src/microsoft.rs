//! Microsoft identity platform provider for Graph calendar and mail access.

use async_trait::async_trait;
use labsync_core::{AuthError, MicrosoftConfig, Provider};

use crate::oauth::{post_token_form, refresh_endpoint, TokenRefresher};
use crate::storage::CredentialBundle;

/// Delegated scopes: calendar write, mail send, and a refresh token
pub const GRAPH_SCOPES: &str = "offline_access Calendars.ReadWrite Mail.Send";

pub struct MicrosoftOAuth2Provider {
    pub client_id: String,
    client_secret: String,
    auth_url: String,
    token_url: String,
    http: reqwest::Client,
}

impl MicrosoftOAuth2Provider {
    pub fn from_config(config: &MicrosoftConfig, http: reqwest::Client) -> Self {
        Self {
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            auth_url: config.auth_url(),
            token_url: config.token_url(),
            http,
        }
    }

    pub fn token_url(&self) -> &str {
        &self.token_url
    }

    /// Returns (url, state) where state should be verified on callback.
    pub fn authorization_url(&self, redirect_uri: &str) -> (String, String) {
        let state = uuid::Uuid::new_v4().to_string();
        let url = format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&response_mode=query&scope={}&state={}",
            self.auth_url,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(GRAPH_SCOPES),
            urlencoding::encode(&state),
        );
        (url, state)
    }

    #[tracing::instrument(skip(self, code), level = "info")]
    pub async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<CredentialBundle, AuthError> {
        let response = post_token_form(
            &self.http,
            &self.token_url,
            &[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code),
                ("grant_type", "authorization_code"),
                ("redirect_uri", redirect_uri),
                ("scope", GRAPH_SCOPES),
            ],
            AuthError::ExchangeFailed,
        )
        .await?;

        Ok(response.into_bundle(&self.token_url, &self.client_id))
    }
}

#[async_trait]
impl TokenRefresher for MicrosoftOAuth2Provider {
    fn provider(&self) -> Provider {
        Provider::Microsoft
    }

    #[tracing::instrument(skip(self, bundle), level = "info")]
    async fn refresh(&self, bundle: &CredentialBundle) -> Result<CredentialBundle, AuthError> {
        let refresh_token = bundle
            .refresh_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MissingRefreshToken)?;

        // Microsoft requires the scope on refresh and usually rotates the refresh token
        let response = post_token_form(
            &self.http,
            refresh_endpoint(bundle, &self.token_url),
            &[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
                ("scope", GRAPH_SCOPES),
            ],
            AuthError::RefreshFailed,
        )
        .await?;

        Ok(response.renew(bundle))
    }
}
