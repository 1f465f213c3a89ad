use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use super::response::ApiError;
use crate::infrastructure::storage::StorageError;
use crate::rpc::RpcError;

/// Orchestrator error taxonomy. Each variant maps to exactly one HTTP status.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Auth(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("transcode failed: {0}")]
    Transcode(RpcError),

    #[error("transcode timed out")]
    TranscodeTimeout,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Storage(_) | AppError::Transcode(_) => StatusCode::BAD_GATEWAY,
            AppError::TranscodeTimeout => StatusCode::GATEWAY_TIMEOUT,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show a client. Upstream failures are summarised.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Storage(_) => "Object storage is unavailable".to_string(),
            AppError::Transcode(_) => "Transcoding failed".to_string(),
            AppError::TranscodeTimeout => "Transcoding timed out".to_string(),
            AppError::Database(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<RpcError> for AppError {
    fn from(e: RpcError) -> Self {
        match e {
            RpcError::Timeout(_) => AppError::TranscodeTimeout,
            other => AppError::Transcode(other),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(e: validator::ValidationErrors) -> Self {
        AppError::Validation(e.to_string())
    }
}

impl From<AppError> for ApiError {
    fn from(e: AppError) -> Self {
        let status = e.status_code();
        if status.is_server_error() {
            error!(error = %e, "Request failed");
        }
        ApiError(e.public_message(), status)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        ApiError::from(self).into_response()
    }
}
