//! Google OAuth2 provider for Calendar access.

use async_trait::async_trait;
use labsync_core::{AuthError, GoogleConfig, Provider};

use crate::oauth::{post_token_form, refresh_endpoint, TokenRefresher};
use crate::storage::CredentialBundle;

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Scope needed to create, update and delete events on the user's calendars
pub const CALENDAR_EVENTS_SCOPE: &str = "https://www.googleapis.com/auth/calendar.events";

pub struct GoogleOAuth2Provider {
    pub client_id: String,
    client_secret: String,
    auth_url: String,
    token_url: String,
    http: reqwest::Client,
}

impl GoogleOAuth2Provider {
    pub fn new(client_id: String, client_secret: String) -> Self {
        Self {
            client_id,
            client_secret,
            auth_url: GOOGLE_AUTH_URL.to_string(),
            token_url: GOOGLE_TOKEN_URL.to_string(),
            http: reqwest::Client::new(),
        }
    }

    /// Build from configuration with a shared HTTP client.
    pub fn from_config(config: &GoogleConfig, http: reqwest::Client) -> Self {
        Self {
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            auth_url: config.auth_url.clone(),
            token_url: config.token_url.clone(),
            http,
        }
    }

    pub fn token_url(&self) -> &str {
        &self.token_url
    }

    /// Generate authorization URL for OAuth flow.
    /// Returns (url, state) where state should be verified on callback.
    pub fn authorization_url(&self, redirect_uri: &str) -> (String, String) {
        let state = uuid::Uuid::new_v4().to_string();

        // Offline access + forced consent so Google always returns a refresh token
        let url = format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&state={}&access_type=offline&include_granted_scopes=true&prompt=consent",
            self.auth_url,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(CALENDAR_EVENTS_SCOPE),
            urlencoding::encode(&state),
        );

        (url, state)
    }

    /// Exchange authorization code for a credential bundle.
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
            ],
            AuthError::ExchangeFailed,
        )
        .await?;

        Ok(response.into_bundle(&self.token_url, &self.client_id))
    }
}

#[async_trait]
impl TokenRefresher for GoogleOAuth2Provider {
    fn provider(&self) -> Provider {
        Provider::Google
    }

    /// Refresh an expired access token.
    #[tracing::instrument(skip(self, bundle), level = "info")]
    async fn refresh(&self, bundle: &CredentialBundle) -> Result<CredentialBundle, AuthError> {
        let refresh_token = bundle
            .refresh_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MissingRefreshToken)?;

        let response = post_token_form(
            &self.http,
            refresh_endpoint(bundle, &self.token_url),
            &[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ],
            AuthError::RefreshFailed,
        )
        .await?;

        Ok(response.renew(bundle))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider_for(server: &MockServer) -> GoogleOAuth2Provider {
        let config = GoogleConfig {
            client_id: "test_client_id".to_string(),
            client_secret: "test_client_secret".to_string(),
            token_url: format!("{}/token", server.uri()),
            ..GoogleConfig::default()
        };
        GoogleOAuth2Provider::from_config(&config, reqwest::Client::new())
    }

    #[test]
    fn test_google_auth_url_contains_scope_and_offline_access() {
        let provider = GoogleOAuth2Provider::new(
            "test_client_id".to_string(),
            "test_client_secret".to_string(),
        );
        let (url, _state) = provider.authorization_url("http://localhost:8000/callback/");
        assert!(url.contains("calendar.events"));
        assert!(url.contains("access_type=offline"));
        assert!(url.contains("prompt=consent"));
        assert!(url.contains("include_granted_scopes=true"));
    }

    #[test]
    fn test_google_state_is_unique() {
        let provider = GoogleOAuth2Provider::new("id".to_string(), "secret".to_string());
        let (_, state1) = provider.authorization_url("http://localhost/cb");
        let (_, state2) = provider.authorization_url("http://localhost/cb");
        assert_ne!(state1, state2);
    }

    #[tokio::test]
    async fn test_exchange_code_builds_bundle() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=authorization_code"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "ya29.access",
                "refresh_token": "1//refresh",
                "expires_in": 3599,
                "token_type": "Bearer",
                "scope": CALENDAR_EVENTS_SCOPE
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = provider_for(&server);
        let bundle = provider.exchange_code("code-1", "http://localhost/cb").await.unwrap();

        assert_eq!(bundle.access_token, "ya29.access");
        assert!(bundle.can_refresh());
        assert!(bundle.has_scope(CALENDAR_EVENTS_SCOPE));
        assert_eq!(bundle.token_endpoint, format!("{}/token", server.uri()));
        assert_eq!(bundle.client_id(), Some("test_client_id"));
    }

    #[tokio::test]
    async fn test_refresh_success_keeps_refresh_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "fresh",
                "expires_in": 3600,
                "token_type": "Bearer"
            })))
            .mount(&server)
            .await;

        let provider = provider_for(&server);
        let stale = CredentialBundle::new(
            "stale",
            Some("1//refresh".to_string()),
            format!("{}/token", server.uri()),
            vec![CALENDAR_EVENTS_SCOPE.to_string()],
            Some(0),
        );

        let fresh = provider.refresh(&stale).await.unwrap();
        assert_eq!(fresh.access_token, "fresh");
        assert_eq!(fresh.refresh_token.as_deref(), Some("1//refresh"));
        assert!(!fresh.needs_refresh());
    }

    #[tokio::test]
    async fn test_refresh_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "invalid_grant"
            })))
            .mount(&server)
            .await;

        let provider = provider_for(&server);
        let stale = CredentialBundle::new(
            "stale",
            Some("revoked".to_string()),
            format!("{}/token", server.uri()),
            vec![],
            Some(0),
        );

        let err = provider.refresh(&stale).await.unwrap_err();
        assert!(matches!(err, AuthError::RefreshFailed(ref msg) if msg.contains("invalid_grant")));
    }

    #[tokio::test]
    async fn test_refresh_without_refresh_token() {
        let provider = GoogleOAuth2Provider::new("id".to_string(), "secret".to_string());
        let bundle = CredentialBundle::new("a", None, GOOGLE_TOKEN_URL, vec![], Some(0));

        let err = provider.refresh(&bundle).await.unwrap_err();
        assert!(matches!(err, AuthError::MissingRefreshToken));
    }
}
