//! HTTP error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use scimsync_engine::{DirectoryError, SyncError};

#[derive(Debug, Error)]
pub enum ApiError {
    /// Route exists but is disabled in this environment.
    #[error("{0}")]
    Forbidden(String),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden"),
            Self::Sync(SyncError::Config(_)) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
            Self::Sync(SyncError::Directory(_)) | Self::Directory(_) => {
                (StatusCode::BAD_GATEWAY, "directory_error")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }
        (status, Json(json!({"error": code, "message": self.to_string()}))).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
