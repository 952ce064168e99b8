//! Error types for the Barangay Desk server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("{0}")]
    Core(#[from] barangay_core::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Stored document is corrupt: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        use barangay_core::Error as CoreError;

        match self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", self.to_string()),
            AppError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "INVALID_CREDENTIALS", self.to_string()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::Core(e) => match e {
                CoreError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_FAILED", msg.clone()),
                CoreError::InvalidRange(msg) => (StatusCode::BAD_REQUEST, "INVALID_RANGE", msg.clone()),
                CoreError::InvalidPath(_) => (StatusCode::BAD_REQUEST, "INVALID_PATH", e.to_string()),
                CoreError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
                CoreError::InvalidTransition { .. } => (StatusCode::CONFLICT, "INVALID_TRANSITION", e.to_string()),
                CoreError::NotLoggedIn => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", e.to_string()),
                CoreError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "INVALID_CREDENTIALS", e.to_string()),
                _ => {
                    tracing::error!("Core error: {:?}", e);
                    (StatusCode::INTERNAL_SERVER_ERROR, "STORE_ERROR", "Store error".to_string())
                }
            },
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR", "Database error".to_string())
            }
            AppError::Serialization(e) => {
                tracing::error!("Serialization error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR", "Database error".to_string())
            }
            AppError::Io(e) => {
                tracing::error!("IO error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR", "IO error".to_string())
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", "Internal server error".to_string())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = self.parts();

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

/// Back across the store seam, so core workflows running against the
/// database keep their typed failures.
impl From<AppError> for barangay_core::Error {
    fn from(e: AppError) -> Self {
        match e {
            AppError::Core(inner) => inner,
            AppError::NotFound(msg) => barangay_core::Error::NotFound(msg),
            AppError::BadRequest(msg) => barangay_core::Error::Validation(msg),
            other => barangay_core::Error::Store(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
