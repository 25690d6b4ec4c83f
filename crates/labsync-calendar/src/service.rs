//! Wiring of stores, providers and sync components from [`Config`].

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use labsync_auth::{
    store_exchanged, CredentialStore, FileCredentialStore, GoogleOAuth2Provider,
    MicrosoftOAuth2Provider, SqliteCredentialStore,
};
use labsync_core::{ActorId, AuthError, Config, CredentialBackend, Provider};
use labsync_services::{EventBackend, SqliteEventStore};

use crate::adapter::CalendarAdapter;
use crate::google::GoogleCalendarAdapter;
use crate::hooks::EventLifecycle;
use crate::messaging::Messenger;
use crate::microsoft::MicrosoftGraphAdapter;
use crate::orchestrator::SyncOrchestrator;
use crate::outcome::{OutcomeSink, TracingSink};

/// Everything an API layer needs: lifecycle hooks, messaging and the OAuth producers.
pub struct SyncService {
    pub events: Arc<dyn EventBackend>,
    pub credentials: Arc<dyn CredentialStore>,
    pub orchestrator: Arc<SyncOrchestrator>,
    pub lifecycle: EventLifecycle,
    pub messenger: Messenger,
    google_oauth: GoogleOAuth2Provider,
    microsoft_oauth: MicrosoftOAuth2Provider,
    config: Config,
}

impl SyncService {
    /// Open the configured stores and build the service with a [`TracingSink`].
    pub fn from_config(config: &Config) -> Result<Self> {
        let validation = config.validate();
        if !validation.is_valid() {
            anyhow::bail!("Invalid configuration: {}", validation.error_summary());
        }
        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        if let Some(parent) = config.database.path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create database directory")?;
        }

        let events: Arc<dyn EventBackend> = Arc::new(
            SqliteEventStore::new(&config.database.path).context("Failed to open event store")?,
        );

        let credentials: Arc<dyn CredentialStore> = match config.credentials.backend {
            CredentialBackend::Sqlite => Arc::new(
                SqliteCredentialStore::new(&config.database.path)
                    .context("Failed to open credential store")?,
            ),
            CredentialBackend::File => {
                Arc::new(FileCredentialStore::new(config.credentials.directory.clone()))
            }
        };

        Self::build(config, events, credentials, Arc::new(TracingSink))
    }

    /// Assemble from already-open stores.
    pub fn build(
        config: &Config,
        events: Arc<dyn EventBackend>,
        credentials: Arc<dyn CredentialStore>,
        sink: Arc<dyn OutcomeSink>,
    ) -> Result<Self> {
        let http = http_client(config)?;

        let adapter: Arc<dyn CalendarAdapter> = match config.sync.provider {
            Provider::Google => Arc::new(GoogleCalendarAdapter::new(&config.google, http.clone())),
            Provider::Microsoft => {
                Arc::new(MicrosoftGraphAdapter::new(&config.microsoft, http.clone()))
            }
        };

        let orchestrator = Arc::new(
            SyncOrchestrator::new(adapter, credentials.clone(), events.clone())
                .with_sink(sink)
                .with_enabled(config.sync.enabled),
        );

        // Mail always goes through Graph, whatever calendar provider is configured
        let messenger = Messenger::new(
            Arc::new(MicrosoftGraphAdapter::new(&config.microsoft, http.clone())),
            credentials.clone(),
        );

        tracing::info!(
            "Calendar sync {} via {}",
            if config.sync.enabled { "enabled" } else { "disabled" },
            config.sync.provider
        );

        Ok(Self {
            lifecycle: EventLifecycle::new(events.clone(), orchestrator.clone()),
            events,
            credentials,
            orchestrator,
            messenger,
            google_oauth: GoogleOAuth2Provider::from_config(&config.google, http.clone()),
            microsoft_oauth: MicrosoftOAuth2Provider::from_config(&config.microsoft, http),
            config: config.clone(),
        })
    }

    /// Start an authorization flow for `provider`. Returns (url, state).
    pub fn authorization_url(&self, provider: Provider) -> (String, String) {
        match provider {
            Provider::Google => self.google_oauth.authorization_url(&self.config.google.redirect_uri),
            Provider::Microsoft => self
                .microsoft_oauth
                .authorization_url(&self.config.microsoft.redirect_uri),
        }
    }

    /// Exchange an authorization code and store the resulting credentials for `actor`.
    ///
    /// `expected_state` is the value returned by [`Self::authorization_url`];
    /// `received_state` is the one echoed back on the callback.
    ///
    /// # Errors
    /// `AuthError::ExchangeFailed` on a state mismatch or if the provider
    /// rejects the code, or a storage error.
    pub async fn complete_authorization(
        &self,
        actor: ActorId,
        provider: Provider,
        code: &str,
        expected_state: &str,
        received_state: &str,
    ) -> Result<(), AuthError> {
        if expected_state.is_empty() || expected_state != received_state {
            tracing::warn!("OAuth state mismatch on {} callback for actor {}", provider, actor);
            return Err(AuthError::ExchangeFailed("state mismatch".to_string()));
        }

        let bundle = match provider {
            Provider::Google => {
                self.google_oauth
                    .exchange_code(code, &self.config.google.redirect_uri)
                    .await?
            }
            Provider::Microsoft => {
                self.microsoft_oauth
                    .exchange_code(code, &self.config.microsoft.redirect_uri)
                    .await?
            }
        };

        store_exchanged(self.credentials.as_ref(), actor, provider, &bundle)
    }
}

/// Shared HTTP client with the bounded per-request timeout.
fn http_client(config: &Config) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.sync.request_timeout_secs))
        .build()
        .context("Failed to build HTTP client")
}
