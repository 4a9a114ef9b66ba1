/// Unified error types for the moderation service
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for moderation operations
#[derive(Error, Debug)]
pub enum ModError {
    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Authentication errors (missing or malformed injected identity)
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// Conflict errors (concurrent decision on the same item)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Store access exceeded the configured deadline
    #[error("Store timeout: {0}")]
    Timeout(String),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error response body returned to clients
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Convert ModError to HTTP response
impl IntoResponse for ModError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ModError::Authentication(_) => (
                StatusCode::UNAUTHORIZED,
                "AuthenticationRequired",
                self.to_string(),
            ),
            ModError::Validation(_) => (
                StatusCode::BAD_REQUEST,
                "InvalidRequest",
                self.to_string(),
            ),
            ModError::NotFound(_) => (
                StatusCode::NOT_FOUND,
                "NotFound",
                self.to_string(),
            ),
            ModError::Conflict(_) => (
                StatusCode::CONFLICT,
                "Conflict",
                self.to_string(),
            ),
            ModError::Timeout(_) => (
                StatusCode::GATEWAY_TIMEOUT,
                "StoreTimeout",
                "Store access timed out".to_string(),
            ),
            ModError::Database(_) | ModError::Internal(_) | ModError::Io(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "InternalServerError",
                "Internal server error".to_string(), // Don't leak details
            ),
        };

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for moderation operations
pub type ModResult<T> = Result<T, ModError>;
