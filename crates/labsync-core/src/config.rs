use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

use crate::types::Provider;

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a message summarizing all errors
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application configuration directory
    pub config_dir: PathBuf,

    /// Local SQLite database (events, actors, credentials)
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Calendar sync behaviour
    #[serde(default)]
    pub sync: SyncConfig,

    /// Where provider credentials are kept
    #[serde(default)]
    pub credentials: CredentialsConfig,

    /// Google OAuth + Calendar API settings
    #[serde(default)]
    pub google: GoogleConfig,

    /// Microsoft Graph settings
    #[serde(default)]
    pub microsoft: MicrosoftConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_config_dir().join("labsync.db"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Master switch; when false every reconcile is skipped
    #[serde(default = "default_sync_enabled")]
    pub enabled: bool,

    /// Provider events are pushed to
    #[serde(default)]
    pub provider: Provider,

    /// Upper bound for a single provider HTTP call, in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_sync_enabled() -> bool {
    true
}

fn default_request_timeout_secs() -> u64 {
    20
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: default_sync_enabled(),
            provider: Provider::Google,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CredentialBackend {
    #[default]
    Sqlite,
    File,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialsConfig {
    pub backend: CredentialBackend,

    /// Directory used by the file backend
    pub directory: PathBuf,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            backend: CredentialBackend::Sqlite,
            directory: default_config_dir().join("credentials"),
        }
    }
}

/// Google OAuth client and Calendar API endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    #[serde(default = "default_google_auth_url")]
    pub auth_url: String,
    #[serde(default = "default_google_token_url")]
    pub token_url: String,
    #[serde(default = "default_google_api_base")]
    pub api_base: String,
    /// Calendar events are written to
    #[serde(default = "default_calendar_id")]
    pub calendar_id: String,
}

fn default_google_auth_url() -> String {
    "https://accounts.google.com/o/oauth2/auth".to_string()
}

fn default_google_token_url() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

fn default_google_api_base() -> String {
    "https://www.googleapis.com/calendar/v3".to_string()
}

fn default_calendar_id() -> String {
    "primary".to_string()
}

impl GoogleConfig {
    /// Check if credentials are configured (not placeholders)
    pub fn is_configured(&self) -> bool {
        is_real_secret(&self.client_id) && is_real_secret(&self.client_secret)
    }
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            client_id: "YOUR_GOOGLE_CLIENT_ID".to_string(),
            client_secret: "YOUR_GOOGLE_CLIENT_SECRET".to_string(),
            redirect_uri: "http://localhost:8000/api/v1/integration/google/callback/".to_string(),
            auth_url: default_google_auth_url(),
            token_url: default_google_token_url(),
            api_base: default_google_api_base(),
            calendar_id: default_calendar_id(),
        }
    }
}

/// Microsoft identity platform + Graph endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MicrosoftConfig {
    pub client_id: String,
    pub client_secret: String,
    pub tenant_id: String,
    pub redirect_uri: String,
    #[serde(default = "default_ms_authority")]
    pub authority: String,
    #[serde(default = "default_graph_base")]
    pub graph_base: String,
}

fn default_ms_authority() -> String {
    "https://login.microsoftonline.com".to_string()
}

fn default_graph_base() -> String {
    "https://graph.microsoft.com/v1.0".to_string()
}

impl MicrosoftConfig {
    pub fn is_configured(&self) -> bool {
        is_real_secret(&self.client_id)
            && is_real_secret(&self.client_secret)
            && !self.tenant_id.is_empty()
    }

    /// Token endpoint for the configured tenant.
    pub fn token_url(&self) -> String {
        format!(
            "{}/{}/oauth2/v2.0/token",
            self.authority.trim_end_matches('/'),
            self.tenant_id
        )
    }

    /// Authorization endpoint for the configured tenant.
    pub fn auth_url(&self) -> String {
        format!(
            "{}/{}/oauth2/v2.0/authorize",
            self.authority.trim_end_matches('/'),
            self.tenant_id
        )
    }
}

impl Default for MicrosoftConfig {
    fn default() -> Self {
        Self {
            client_id: "YOUR_MS_GRAPH_CLIENT_ID".to_string(),
            client_secret: "YOUR_MS_GRAPH_CLIENT_SECRET".to_string(),
            tenant_id: "common".to_string(),
            redirect_uri: "http://localhost:8000/api/v1/integration/microsoft/callback/".to_string(),
            authority: default_ms_authority(),
            graph_base: default_graph_base(),
        }
    }
}

fn is_real_secret(value: &str) -> bool {
    !value.is_empty() && !value.starts_with("YOUR_")
}

fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("labsync")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_dir: default_config_dir(),
            database: DatabaseConfig::default(),
            sync: SyncConfig::default(),
            credentials: CredentialsConfig::default(),
            google: GoogleConfig::default(),
            microsoft: MicrosoftConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default location, creating it if missing,
    /// then apply environment overrides.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = Self::load_from(&path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from an explicit path, writing defaults if it doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            let config = Self::default();
            config.save_to(path)?;
            return Ok(config);
        }

        let contents = std::fs::read_to_string(path).context("Failed to read config file")?;
        let config: Config = toml::from_str(&contents).context("Failed to parse config file")?;
        Ok(config)
    }

    /// Load configuration and validate it
    ///
    /// Returns an error if validation fails with critical errors; warnings are logged.
    pub fn load_validated() -> Result<(Self, ValidationResult)> {
        let config = Self::load()?;
        let validation = config.validate();

        if !validation.is_valid() {
            anyhow::bail!(
                "Configuration validation failed: {}",
                validation.error_summary()
            );
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok((config, validation))
    }

    /// Overlay provider secrets from the process environment.
    ///
    /// Called once at startup; adapters receive the resulting values and never
    /// consult the environment themselves.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let set = |target: &mut String, key: &str| {
            if let Some(value) = lookup(key).filter(|v| !v.is_empty()) {
                tracing::debug!("Config override from {}", key);
                *target = value;
            }
        };

        set(&mut self.google.client_id, "GOOGLE_CLIENT_ID");
        set(&mut self.google.client_secret, "GOOGLE_CLIENT_SECRET");
        set(&mut self.google.redirect_uri, "GOOGLE_REDIRECT_URI");
        set(&mut self.microsoft.client_id, "MS_GRAPH_CLIENT_ID");
        set(&mut self.microsoft.client_secret, "MS_GRAPH_CLIENT_SECRET");
        set(&mut self.microsoft.tenant_id, "MS_GRAPH_TENANT_ID");
    }

    /// Validate the configuration
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        self.validate_url(&self.google.token_url, "google.token_url", &mut result);
        self.validate_url(&self.google.auth_url, "google.auth_url", &mut result);
        self.validate_url(&self.google.api_base, "google.api_base", &mut result);
        self.validate_url(&self.google.redirect_uri, "google.redirect_uri", &mut result);
        self.validate_url(&self.microsoft.authority, "microsoft.authority", &mut result);
        self.validate_url(&self.microsoft.graph_base, "microsoft.graph_base", &mut result);

        if self.google.calendar_id.trim().is_empty() {
            result.add_error("google.calendar_id", "Calendar id cannot be empty");
        }

        if self.sync.request_timeout_secs == 0 {
            result.add_error(
                "sync.request_timeout_secs",
                "Request timeout must be greater than 0",
            );
        } else if self.sync.request_timeout_secs > 120 {
            result.add_warning(
                "sync.request_timeout_secs",
                "Provider calls block the request; a timeout above 2 minutes is unusually long",
            );
        }

        if !self.sync.enabled {
            result.add_warning("sync.enabled", "Calendar sync disabled");
        } else {
            let configured = match self.sync.provider {
                Provider::Google => self.google.is_configured(),
                Provider::Microsoft => self.microsoft.is_configured(),
            };
            if !configured {
                result.add_warning(
                    self.sync.provider.as_str(),
                    "OAuth client not configured - token refresh will fail and sync will be skipped",
                );
            }
        }

        if !self.microsoft.is_configured() {
            result.add_warning(
                "microsoft",
                "Microsoft Graph not configured - sending to Outlook is unavailable",
            );
        }

        result
    }

    fn validate_url(&self, url_str: &str, field_name: &str, result: &mut ValidationResult) {
        match Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    result.add_error(
                        field_name,
                        format!("URL must use http or https scheme, got: {}", url.scheme()),
                    );
                }
                if url.host().is_none() {
                    result.add_error(field_name, "URL must have a host");
                }
            }
            Err(e) => {
                result.add_error(field_name, format!("Invalid URL: {}", e));
            }
        }
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Save configuration to an explicit path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, contents).context("Failed to write config file")?;

        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("labsync");

        Ok(config_dir.join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_valid_default_config() {
        let config = Config::default();
        let result = config.validate();
        // Placeholders only produce warnings
        assert!(result.is_valid(), "Default config should be valid: {:?}", result.errors);
        assert!(result.warnings.iter().any(|w| w.field == "google"));
        assert!(result.warnings.iter().any(|w| w.field == "microsoft"));
    }

    #[test]
    fn test_invalid_token_url() {
        let mut config = Config::default();
        config.google.token_url = "not-a-url".to_string();
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.field == "google.token_url"));
    }

    #[test]
    fn test_invalid_url_scheme() {
        let mut config = Config::default();
        config.microsoft.graph_base = "ftp://graph.example.com".to_string();
        let result = config.validate();
        assert!(result.errors.iter().any(|e| e.message.contains("http or https")));
    }

    #[test]
    fn test_zero_timeout_is_error() {
        let mut config = Config::default();
        config.sync.request_timeout_secs = 0;
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.field == "sync.request_timeout_secs"));
    }

    #[test]
    fn test_env_overrides_replace_placeholders() {
        let env: HashMap<&str, &str> = [
            ("GOOGLE_CLIENT_ID", "gid"),
            ("GOOGLE_CLIENT_SECRET", "gsecret"),
            ("MS_GRAPH_TENANT_ID", "tenant-1"),
            ("MS_GRAPH_CLIENT_ID", ""),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.google.client_id, "gid");
        assert!(config.google.is_configured());
        assert_eq!(config.microsoft.tenant_id, "tenant-1");
        // Empty values are ignored
        assert_eq!(config.microsoft.client_id, "YOUR_MS_GRAPH_CLIENT_ID");
    }

    #[test]
    fn test_microsoft_endpoints_use_tenant() {
        let mut config = MicrosoftConfig::default();
        config.tenant_id = "contoso".to_string();
        config.authority = "https://login.example.com/".to_string();
        assert_eq!(
            config.token_url(),
            "https://login.example.com/contoso/oauth2/v2.0/token"
        );
        assert!(config.auth_url().ends_with("/contoso/oauth2/v2.0/authorize"));
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.sync.provider = Provider::Microsoft;
        config.sync.request_timeout_secs = 5;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.sync.provider, Provider::Microsoft);
        assert_eq!(loaded.sync.request_timeout_secs, 5);
    }

    #[test]
    fn test_load_from_missing_file_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.sync.request_timeout_secs, 20);
    }
}
