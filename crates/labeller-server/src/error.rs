//! Error types for the services and their HTTP mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use labeller_core::{Checkpoint, CredentialError, LabelParseError, PlacementError};
use labeller_store::StoreError;
use thiserror::Error;

/// Errors that can occur while serving a request.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// A pending label did not parse; the whole batch is dropped.
    #[error("malformed label batch: {0}")]
    MalformedLabel(#[from] LabelParseError),

    /// Declared sequence indexes do not follow the checkpoint.
    #[error("label batch out of sequence: {0}")]
    Placement(#[from] PlacementError),

    /// The checkpoint moved between planning and commit.
    #[error("checkpoint moved from {expected} to {current}")]
    StaleCheckpoint {
        expected: Checkpoint,
        current: Checkpoint,
    },

    /// Credential could not be minted.
    #[error("credential error: {0}")]
    Credential(#[from] CredentialError),

    /// Missing or invalid credential.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
}

impl ServiceError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServiceError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ServiceError::Placement(_)
            | ServiceError::StaleCheckpoint { .. }
            | ServiceError::Store(StoreError::Conflict { .. }) => StatusCode::CONFLICT,
            ServiceError::Store(_) | ServiceError::MalformedLabel(_) | ServiceError::Credential(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::warn!(error = %self, status = status.as_u16(), "request rejected");
        }

        let body = serde_json::json!({ "status": "error", "error": self.to_string() });
        (status, Json(body)).into_response()
    }
}

/// Result type for service operations.
pub type Result<T> = std::result::Result<T, ServiceError>;
