pub mod config;
pub mod error;
pub mod types;

pub use config::{
    Config, CredentialBackend, CredentialsConfig, DatabaseConfig, GoogleConfig, MicrosoftConfig,
    SyncConfig, ValidationResult,
};
pub use error::{
    AppError, AuthError, ConfigError, DatabaseError, NetworkError, ReqwestErrorExt,
    RusqliteErrorExt,
};
pub use types::{ActorId, Provider};

use anyhow::Result;

/// Initialize logging for the process
pub fn init() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {}", e))?;

    tracing::info!("labsync core initialized");
    Ok(())
}
