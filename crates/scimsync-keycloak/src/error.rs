//! Error types for the Keycloak source.

use scimsync_engine::DirectoryError;
use thiserror::Error;

/// Result type alias using `KeycloakError`.
pub type KeycloakResult<T> = Result<T, KeycloakError>;

/// Errors that can occur when talking to the Keycloak admin API.
#[derive(Debug, Error)]
pub enum KeycloakError {
    /// Configuration validation error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Token acquisition or admin API authorization failed.
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Admin API answered with an unexpected status.
    #[error("Keycloak API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Resource not found: {0}")]
    NotFound(String),

    /// HTTP request error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing error.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

impl From<KeycloakError> for DirectoryError {
    fn from(err: KeycloakError) -> Self {
        match err {
            KeycloakError::Auth(msg) => DirectoryError::Auth(msg),
            KeycloakError::Api { status, message } => DirectoryError::Rejected {
                status,
                detail: message,
            },
            KeycloakError::NotFound(msg) => DirectoryError::NotFound(msg),
            KeycloakError::Http(e) if e.is_timeout() => DirectoryError::Timeout(e.to_string()),
            KeycloakError::Http(e) if e.is_decode() => {
                DirectoryError::InvalidResponse(e.to_string())
            }
            KeycloakError::Json(e) => DirectoryError::InvalidResponse(e.to_string()),
            other => DirectoryError::Transport(other.to_string()),
        }
    }
}
