//! Provider-agnostic OAuth2 plumbing shared by the Google and Microsoft providers.

use async_trait::async_trait;
use labsync_core::{ActorId, AuthError, NetworkError, Provider, ReqwestErrorExt};
use serde::{Deserialize, Serialize};

use crate::storage::{CredentialBundle, CredentialStore};

/// Token endpoint response (authorization-code exchange or refresh)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,
    pub token_type: Option<String>,
    pub scope: Option<String>,
}

impl TokenResponse {
    fn expires_at(&self) -> Option<i64> {
        self.expires_in.map(|secs| chrono::Utc::now().timestamp() + secs)
    }

    fn scopes(&self) -> Option<Vec<String>> {
        self.scope.as_deref().map(|s| {
            s.split_whitespace()
                .map(str::to_string)
                .collect()
        })
    }

    /// Build a fresh bundle from an authorization-code exchange
    pub fn into_bundle(self, token_endpoint: &str, client_id: &str) -> CredentialBundle {
        let expires_at = self.expires_at();
        let scopes = self.scopes().unwrap_or_default();
        CredentialBundle::new(
            self.access_token,
            self.refresh_token,
            token_endpoint,
            scopes,
            expires_at,
        )
        .with_client_id(client_id)
    }

    /// Apply a refresh response on top of the bundle it renewed
    pub fn renew(self, previous: &CredentialBundle) -> CredentialBundle {
        let expires_at = self.expires_at();
        let scopes = self.scopes();
        previous.renewed(self.access_token, self.refresh_token, expires_at, scopes)
    }
}

/// Silent token renewal for one provider
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    fn provider(&self) -> Provider;

    /// Redeem the bundle's refresh token for a new access token.
    ///
    /// # Errors
    /// `AuthError::MissingRefreshToken` if the bundle cannot be refreshed,
    /// `AuthError::RefreshFailed` if the provider rejects the refresh token.
    async fn refresh(&self, bundle: &CredentialBundle) -> Result<CredentialBundle, AuthError>;
}

/// POST a form to a token endpoint and decode the response.
///
/// `reject` builds the error for a non-success status.
pub(crate) async fn post_token_form(
    client: &reqwest::Client,
    token_url: &str,
    form: &[(&str, &str)],
    reject: fn(String) -> AuthError,
) -> Result<TokenResponse, AuthError> {
    let response = client
        .post(token_url)
        .form(form)
        .send()
        .await
        .map_err(|e| AuthError::Network(e.into_network_error()))?;

    if !response.status().is_success() {
        let status = response.status();
        let error_text = response.text().await.unwrap_or_default();
        return Err(reject(format!("{}: {}", status, error_text)));
    }

    response
        .json::<TokenResponse>()
        .await
        .map_err(|e| AuthError::Network(NetworkError::InvalidResponse(e.to_string())))
}

/// Endpoint a refresh should go to: the bundle's own, else the provider default
pub(crate) fn refresh_endpoint<'a>(bundle: &'a CredentialBundle, fallback: &'a str) -> &'a str {
    if bundle.token_endpoint.is_empty() {
        fallback
    } else {
        &bundle.token_endpoint
    }
}

/// Hand a freshly exchanged bundle to the credential store.
///
/// A second authorization for the same pair replaces the first.
pub fn store_exchanged(
    store: &dyn CredentialStore,
    actor: ActorId,
    provider: Provider,
    bundle: &CredentialBundle,
) -> Result<(), AuthError> {
    store.save(actor, provider, bundle)?;
    tracing::info!("OAuth2 flow completed for actor {} ({})", actor, provider);
    Ok(())
}
