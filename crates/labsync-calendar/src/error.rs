//! Provider-call error types.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Authentication required")]
    AuthRequired,

    #[error("Token expired")]
    TokenExpired,

    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    #[error("Remote resource not found: {0}")]
    NotFound(String),

    #[error("Invalid event data: {0}")]
    InvalidEventData(String),

    #[error("Conflict: remote resource was modified")]
    Conflict,

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Request timed out")]
    Timeout,

    #[error("Network error: {0}")]
    Network(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else {
            Self::Network(e.to_string())
        }
    }
}

/// Coarse failure classes the sync layer reasons about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Network, 5xx, rate limit or timeout. Local state is left alone.
    Transient,
    /// The addressed remote resource no longer exists
    RemoteNotFound,
    /// Provider refused the access token
    AuthExpired,
    /// Provider rejected the request itself (4xx other than auth/not-found)
    Rejected,
}

impl ProviderError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::AuthRequired | Self::TokenExpired => FailureKind::AuthExpired,
            Self::NotFound(_) => FailureKind::RemoteNotFound,
            Self::RateLimited(_) | Self::Timeout | Self::Network(_) => FailureKind::Transient,
            Self::Api { status, .. } if *status >= 500 => FailureKind::Transient,
            Self::InvalidEventData(_) | Self::Conflict | Self::Api { .. } => FailureKind::Rejected,
        }
    }

    /// User-friendly error message for API responses.
    pub fn user_message(&self) -> String {
        match self {
            Self::AuthRequired => "Please connect your calendar account".to_string(),
            Self::TokenExpired => "Your calendar session has expired. Please reconnect.".to_string(),
            Self::RateLimited(secs) => format!("Too many requests. Please wait {} seconds.", secs),
            Self::NotFound(_) => "The remote item no longer exists".to_string(),
            Self::InvalidEventData(msg) => format!("Invalid event: {}", msg),
            Self::Conflict => "The item was modified elsewhere. Please refresh.".to_string(),
            Self::Api { status, .. } => format!("Provider error ({})", status),
            Self::Timeout => "The provider did not respond in time.".to_string(),
            Self::Network(_) => "Network error. Check your connection.".to_string(),
        }
    }

    /// Map an error response to the matching variant.
    pub(crate) async fn from_response(response: reqwest::Response) -> Self {
        let status = response.status().as_u16();
        match status {
            401 => Self::TokenExpired,
            403 => Self::AuthRequired,
            404 | 410 => Self::NotFound(response.text().await.unwrap_or_default()),
            409 | 412 => Self::Conflict,
            429 => {
                let retry_after = response
                    .headers()
                    .get("Retry-After")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(60);
                Self::RateLimited(retry_after)
            }
            400 => Self::InvalidEventData(response.text().await.unwrap_or_default()),
            _ => Self::Api {
                status,
                message: response.text().await.unwrap_or_default(),
            },
        }
    }
}
