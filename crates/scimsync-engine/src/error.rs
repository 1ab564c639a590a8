//! Error types for the reconciliation engine and its adapter boundary.

use thiserror::Error;

/// Result type alias for adapter calls.
pub type DirectoryResult<T> = Result<T, DirectoryError>;

/// Result type alias for engine operations that can fail as a whole.
pub type EngineResult<T> = Result<T, SyncError>;

/// Error reported by a [`SourceDirectory`](crate::directory::SourceDirectory)
/// or [`DestinationDirectory`](crate::directory::DestinationDirectory).
///
/// Adapter crates convert their transport-specific errors into this enum so the
/// engine can apply one failure policy regardless of the remote system.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DirectoryError {
    /// The remote system could not be reached.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Authentication against the remote system failed.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// The remote system rejected the request.
    #[error("Request rejected ({status}): {detail}")]
    Rejected { status: u16, detail: String },

    /// The referenced resource does not exist.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// The resource conflicts with an existing one (e.g. duplicate userName).
    #[error("Resource conflict: {0}")]
    Conflict(String),

    /// The request did not complete in time.
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// The remote system answered with a payload we could not interpret.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl DirectoryError {
    /// Whether the error points at the remote system as a whole rather than
    /// at a single rejected entity.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Auth(_) | Self::Timeout(_))
    }
}

/// Errors surfaced by the engine itself.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Engine configuration is invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A directory call failed while building a read-only view.
    #[error(transparent)]
    Directory(#[from] DirectoryError),
}
