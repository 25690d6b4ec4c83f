//! Provider credentials: persistence and OAuth2 flows for Google and Microsoft.

pub mod google;
pub mod microsoft;
pub mod oauth;
pub mod storage;

pub use google::{GoogleOAuth2Provider, CALENDAR_EVENTS_SCOPE};
pub use microsoft::{MicrosoftOAuth2Provider, GRAPH_SCOPES};
pub use oauth::{store_exchanged, TokenRefresher, TokenResponse};
pub use storage::{CredentialBundle, CredentialStore, FileCredentialStore, SqliteCredentialStore};
