//! HTTP error responses
//!
//! Every failure is rendered as `{"error": {"code": ..., "message": ...}}`.

use crate::catalog::CatalogError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Conflict (409), e.g. natural key already taken
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Upstream registry failure; 4xx statuses are passed through, anything
    /// else becomes 502
    #[error("Upstream error: {message}")]
    Upstream { status: Option<u16>, message: String },

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<CatalogError> for ApiError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::NotFound(msg) => ApiError::NotFound(msg),
            CatalogError::UnknownNode(msg) | CatalogError::InvalidInput(msg) => {
                ApiError::BadRequest(msg)
            }
            CatalogError::Conflict(msg) => ApiError::Conflict(msg),
            CatalogError::Upstream { status, message } => ApiError::Upstream { status, message },
            CatalogError::Store(e) => ApiError::Internal(e.to_string()),
        }
    }
}

/// Upstream 4xx other than 404 passes through, anything else is 502
fn upstream_status(status: Option<u16>) -> StatusCode {
    status
        .filter(|s| (400..500).contains(s) && *s != 404)
        .and_then(|s| StatusCode::from_u16(s).ok())
        .unwrap_or(StatusCode::BAD_GATEWAY)
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg),
            ApiError::Upstream { status, message } => {
                (upstream_status(status), "UPSTREAM_ERROR", message)
            }
            ApiError::Internal(msg) => {
                error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg)
            }
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
