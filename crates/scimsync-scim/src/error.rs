//! SCIM client error types.

use scimsync_engine::DirectoryError;
use thiserror::Error;

/// Result type alias for SCIM client operations.
pub type ScimClientResult<T> = Result<T, ScimClientError>;

/// Errors raised while talking to a SCIM 2.0 service provider.
#[derive(Debug, Error)]
pub enum ScimClientError {
    /// Client configuration is invalid (bad URL, missing credentials).
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The service provider could not be reached.
    #[error("SCIM endpoint unreachable: {0}")]
    Unreachable(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A response body did not match the expected SCIM schema.
    #[error("Failed to parse SCIM response: {0}")]
    ParseError(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Uniqueness violation, typically a duplicate `userName`.
    #[error("Resource conflict: {0}")]
    Conflict(String),

    #[error("Rate limited (retry after {retry_after_secs:?}s)")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("Authentication failed: {0}")]
    AuthError(String),

    /// Any other non-success status.
    #[error("SCIM error ({status}): {detail}")]
    ScimError { status: u16, detail: String },

    /// Retries ran out. `last_status` is the provider's answer to the final
    /// attempt, `None` when it was never reached.
    #[error("Max retries exceeded after {attempts} attempt(s): {message}")]
    MaxRetriesExceeded {
        attempts: u32,
        last_status: Option<u16>,
        message: String,
    },
}

impl ScimClientError {
    /// Transient failures worth another attempt.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Unreachable(_) | Self::RateLimited { .. } => true,
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    /// HTTP status the provider answered with, if it answered at all.
    #[must_use]
    pub fn provider_status(&self) -> Option<u16> {
        match self {
            Self::ScimError { status, .. } => Some(*status),
            Self::RateLimited { .. } => Some(429),
            Self::NotFound(_) => Some(404),
            Self::Conflict(_) => Some(409),
            _ => None,
        }
    }

    /// Whether the provider answered with a 5xx status.
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        matches!(self, Self::ScimError { status, .. } if *status >= 500)
    }
}

impl From<ScimClientError> for DirectoryError {
    fn from(err: ScimClientError) -> Self {
        match err {
            ScimClientError::NotFound(detail) => Self::NotFound(detail),
            ScimClientError::Conflict(detail) => Self::Conflict(detail),
            ScimClientError::AuthError(detail) => Self::Auth(detail),
            ScimClientError::ScimError { status, detail } => Self::Rejected { status, detail },
            ScimClientError::RateLimited { retry_after_secs } => Self::Rejected {
                status: 429,
                detail: match retry_after_secs {
                    Some(secs) => format!("rate limited, retry after {secs}s"),
                    None => "rate limited".to_string(),
                },
            },
            // The provider kept answering for this one request; the endpoint
            // itself is up.
            ScimClientError::MaxRetriesExceeded {
                attempts,
                last_status: Some(status),
                message,
            } => Self::Rejected {
                status,
                detail: format!("gave up after {attempts} attempt(s): {message}"),
            },
            ScimClientError::ParseError(detail) => Self::InvalidResponse(detail),
            ScimClientError::Http(e) if e.is_timeout() => Self::Timeout(e.to_string()),
            ScimClientError::Http(e) if e.is_decode() => Self::InvalidResponse(e.to_string()),
            other => Self::Transport(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_classification() {
        assert!(ScimClientError::Unreachable("refused".into()).is_retryable());
        assert!(ScimClientError::RateLimited {
            retry_after_secs: Some(5)
        }
        .is_retryable());
        assert!(!ScimClientError::Conflict("dup".into()).is_retryable());

        let unavailable = ScimClientError::ScimError {
            status: 503,
            detail: "down".into(),
        };
        assert!(unavailable.is_server_error());
        assert!(!ScimClientError::ScimError {
            status: 400,
            detail: "bad".into()
        }
        .is_server_error());
    }

    #[test]
    fn test_directory_error_mapping() {
        assert_eq!(
            DirectoryError::from(ScimClientError::Conflict("bob".into())),
            DirectoryError::Conflict("bob".into())
        );
        assert_eq!(
            DirectoryError::from(ScimClientError::ScimError {
                status: 400,
                detail: "invalid userName".into()
            }),
            DirectoryError::Rejected {
                status: 400,
                detail: "invalid userName".into()
            }
        );
        assert!(matches!(
            DirectoryError::from(ScimClientError::AuthError("expired".into())),
            DirectoryError::Auth(_)
        ));
        assert!(matches!(
            DirectoryError::from(ScimClientError::ParseError("eof".into())),
            DirectoryError::InvalidResponse(_)
        ));

        let exhausted = DirectoryError::from(ScimClientError::MaxRetriesExceeded {
            attempts: 6,
            last_status: None,
            message: "GET /Users".into(),
        });
        assert!(exhausted.is_fatal());
    }

    #[test]
    fn test_exhausted_server_errors_stay_per_request() {
        let err = DirectoryError::from(ScimClientError::MaxRetriesExceeded {
            attempts: 3,
            last_status: Some(500),
            message: "create user: SCIM error (500): vCenter internal error".into(),
        });
        match err {
            DirectoryError::Rejected { status, detail } => {
                assert_eq!(status, 500);
                assert!(detail.contains("3 attempt(s)"));
            }
            other => panic!("expected Rejected, got {other:?}"),
        }
        assert!(!DirectoryError::Rejected {
            status: 500,
            detail: String::new()
        }
        .is_fatal());
    }

    #[test]
    fn test_rate_limited_maps_to_rejected() {
        let err = DirectoryError::from(ScimClientError::RateLimited {
            retry_after_secs: None,
        });
        assert!(matches!(err, DirectoryError::Rejected { status: 429, .. }));
    }
}
