use labsync_core::{ActorId, AuthError, Provider, RusqliteErrorExt};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Renewable provider credentials for one actor
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialBundle {
    /// Access token for API requests
    pub access_token: String,

    /// Refresh token; absent means the actor must re-authorize once the access token lapses
    pub refresh_token: Option<String>,

    /// Token endpoint the refresh token is redeemed at
    pub token_endpoint: String,

    /// Scopes granted to this token
    pub scopes: Vec<String>,

    /// Expiration timestamp (Unix seconds); `None` when the provider didn't say
    #[serde(default)]
    pub expires_at: Option<i64>,

    /// Serialized client state sufficient to rebuild an authenticated client
    #[serde(default)]
    pub snapshot: serde_json::Value,
}

impl std::fmt::Debug for CredentialBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialBundle")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("token_endpoint", &self.token_endpoint)
            .field("scopes", &self.scopes)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl CredentialBundle {
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        token_endpoint: impl Into<String>,
        scopes: Vec<String>,
        expires_at: Option<i64>,
    ) -> Self {
        let mut bundle = Self {
            access_token: access_token.into(),
            refresh_token,
            token_endpoint: token_endpoint.into(),
            scopes,
            expires_at,
            snapshot: serde_json::Value::Null,
        };
        bundle.snapshot = bundle.build_snapshot(None);
        bundle
    }

    /// Record the OAuth client id in the snapshot. Client secrets are never stored.
    pub fn with_client_id(mut self, client_id: &str) -> Self {
        self.snapshot = self.build_snapshot(Some(client_id));
        self
    }

    /// Client id recorded in the snapshot, if any
    pub fn client_id(&self) -> Option<&str> {
        self.snapshot.get("client_id").and_then(|v| v.as_str())
    }

    fn build_snapshot(&self, client_id: Option<&str>) -> serde_json::Value {
        let client_id = client_id.or_else(|| self.client_id()).map(str::to_string);
        serde_json::json!({
            "token": self.access_token,
            "refresh_token": self.refresh_token,
            "token_uri": self.token_endpoint,
            "client_id": client_id,
            "scopes": self.scopes,
            "expiry": self.expires_at,
        })
    }

    /// Check if the token needs refresh (within 5 minutes of expiry)
    pub fn needs_refresh(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => chrono::Utc::now().timestamp() >= expires_at - 300,
            None => false,
        }
    }

    /// Check if the token is expired
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => chrono::Utc::now().timestamp() >= expires_at,
            None => false,
        }
    }

    /// Whether a silent refresh can be attempted
    pub fn can_refresh(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
    }

    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == scope)
    }

    /// Replace the token fields after a renewal, keeping the old refresh token
    /// when the provider did not rotate it.
    pub fn renewed(
        &self,
        access_token: String,
        refresh_token: Option<String>,
        expires_at: Option<i64>,
        scopes: Option<Vec<String>>,
    ) -> Self {
        let mut next = Self {
            access_token,
            refresh_token: refresh_token.or_else(|| self.refresh_token.clone()),
            token_endpoint: self.token_endpoint.clone(),
            scopes: scopes.unwrap_or_else(|| self.scopes.clone()),
            expires_at,
            snapshot: serde_json::Value::Null,
        };
        next.snapshot = next.build_snapshot(self.client_id());
        next
    }
}

/// Per-(actor, provider) credential persistence.
///
/// Absence is a normal state and is reported as `Ok(None)`.
pub trait CredentialStore: Send + Sync {
    /// Most recently saved bundle for the pair, if the actor ever authorized
    fn load(&self, actor: ActorId, provider: Provider) -> Result<Option<CredentialBundle>, AuthError>;

    /// Upsert the bundle for the pair, replacing any previous one atomically
    fn save(&self, actor: ActorId, provider: Provider, bundle: &CredentialBundle) -> Result<(), AuthError>;
}

fn storage_err(e: impl std::fmt::Display) -> AuthError {
    AuthError::StorageError(e.to_string())
}

/// Credential store backed by a single SQLite table keyed by (actor, provider)
pub struct SqliteCredentialStore {
    conn: Mutex<Connection>,
}

impl SqliteCredentialStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, AuthError> {
        let conn = Connection::open(path).map_err(|e| storage_err(e.into_database_error()))?;
        Self::with_connection(conn)
    }

    pub fn in_memory() -> Result<Self, AuthError> {
        let conn = Connection::open_in_memory().map_err(|e| storage_err(e.into_database_error()))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, AuthError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS provider_credentials (
                actor_id INTEGER NOT NULL,
                provider TEXT NOT NULL,
                access_token TEXT NOT NULL,
                refresh_token TEXT,
                token_endpoint TEXT NOT NULL,
                scopes_json TEXT NOT NULL,
                expires_at INTEGER,
                snapshot_json TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (actor_id, provider)
            );
            "#,
        )
        .map_err(|e| storage_err(e.into_database_error()))?;

        Ok(Self { conn: Mutex::new(conn) })
    }
}

impl CredentialStore for SqliteCredentialStore {
    fn load(&self, actor: ActorId, provider: Provider) -> Result<Option<CredentialBundle>, AuthError> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                r#"
                SELECT access_token, refresh_token, token_endpoint, scopes_json, expires_at, snapshot_json
                FROM provider_credentials WHERE actor_id = ?1 AND provider = ?2
                "#,
                params![actor.0, provider.as_str()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, Option<i64>>(4)?,
                        row.get::<_, String>(5)?,
                    ))
                },
            )
            .optional()
            .map_err(|e| storage_err(e.into_database_error()))?;

        let Some((access_token, refresh_token, token_endpoint, scopes_json, expires_at, snapshot_json)) =
            row
        else {
            return Ok(None);
        };

        let scopes: Vec<String> = serde_json::from_str(&scopes_json).map_err(storage_err)?;
        let snapshot: serde_json::Value =
            serde_json::from_str(&snapshot_json).map_err(storage_err)?;

        Ok(Some(CredentialBundle {
            access_token,
            refresh_token,
            token_endpoint,
            scopes,
            expires_at,
            snapshot,
        }))
    }

    fn save(&self, actor: ActorId, provider: Provider, bundle: &CredentialBundle) -> Result<(), AuthError> {
        let scopes_json = serde_json::to_string(&bundle.scopes).map_err(storage_err)?;
        let snapshot_json = serde_json::to_string(&bundle.snapshot).map_err(storage_err)?;
        let now = chrono::Utc::now().to_rfc3339();

        // Single statement; readers see either the old row or the new one.
        self.conn
            .lock()
            .execute(
                r#"
                INSERT INTO provider_credentials
                    (actor_id, provider, access_token, refresh_token, token_endpoint, scopes_json,
                     expires_at, snapshot_json, created_at, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)
                ON CONFLICT(actor_id, provider) DO UPDATE SET
                    access_token = excluded.access_token,
                    refresh_token = excluded.refresh_token,
                    token_endpoint = excluded.token_endpoint,
                    scopes_json = excluded.scopes_json,
                    expires_at = excluded.expires_at,
                    snapshot_json = excluded.snapshot_json,
                    updated_at = excluded.updated_at
                "#,
                params![
                    actor.0,
                    provider.as_str(),
                    bundle.access_token,
                    bundle.refresh_token,
                    bundle.token_endpoint,
                    scopes_json,
                    bundle.expires_at,
                    snapshot_json,
                    now,
                ],
            )
            .map_err(|e| storage_err(e.into_database_error()))?;

        tracing::debug!("Stored {} credentials for actor {}", provider, actor);
        Ok(())
    }
}

/// File-based credential store, one JSON file per (actor, provider)
pub struct FileCredentialStore {
    root: PathBuf,
}

impl FileCredentialStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Get the token file path for a pair
    fn token_path(&self, actor: ActorId, provider: Provider) -> PathBuf {
        self.root
            .join(provider.as_str())
            .join(format!("{}.json", actor))
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self, actor: ActorId, provider: Provider) -> Result<Option<CredentialBundle>, AuthError> {
        let path = self.token_path(actor, provider);

        let json = match fs::read_to_string(&path) {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(storage_err(format!("Failed to read {:?}: {}", path, e))),
        };

        let bundle: CredentialBundle = serde_json::from_str(&json)
            .map_err(|e| storage_err(format!("Failed to deserialize {:?}: {}", path, e)))?;

        Ok(Some(bundle))
    }

    fn save(&self, actor: ActorId, provider: Provider, bundle: &CredentialBundle) -> Result<(), AuthError> {
        let path = self.token_path(actor, provider);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| storage_err(format!("Failed to create credentials directory: {}", e)))?;
        }

        let json = serde_json::to_string_pretty(bundle).map_err(storage_err)?;

        // Write then rename so readers never see a half-written file
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, &json).map_err(|e| storage_err(format!("Failed to write token file: {}", e)))?;
        fs::rename(&tmp, &path)
            .map_err(|e| storage_err(format!("Failed to replace token file: {}", e)))?;

        tracing::info!("Stored {} credentials for actor {} at {:?}", provider, actor, path);
        Ok(())
    }
}
