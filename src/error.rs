//! # Error Handling and Response Types
//!
//! Standardized error types for the overlay proxy. Startup (seeding) failures
//! propagate through [`AppResult`] up to `main` and abort the process before
//! the listening socket is bound. Request-time failures are converted into
//! JSON error responses via the [`IntoResponse`] implementation.
//!
//! All HTTP-visible errors share one response shape:
//!
//! ```json
//! {
//!   "error": "Human-readable error message",
//!   "code": "machine_readable_error_code",
//!   "details": {...},
//!   "timestamp": "2024-01-01T12:00:00Z"
//! }
//! ```

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;

/// Standardized error response structure for consistent API error handling
#[derive(Serialize, Debug)]
pub struct ApiErrorResponse {
    pub error: String,          // Human-readable error message
    pub code: String,           // Machine-readable error code
    pub details: Option<Value>, // Additional error details
    pub timestamp: String,      // ISO 8601 timestamp
}

/// Error code classification for machine-readable error types
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorCode {
    ValidationError, // For malformed requests and archive/manifest failures
    NotFound,        // For missing resources
    UpstreamError,   // For upstream registry failures
    InternalError,   // For server-side errors
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ValidationError => "validation_error",
            ErrorCode::NotFound => "not_found",
            ErrorCode::UpstreamError => "upstream_error",
            ErrorCode::InternalError => "internal_error",
        }
    }

    pub fn http_status(&self) -> StatusCode {
        match self {
            ErrorCode::ValidationError => StatusCode::BAD_REQUEST,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::UpstreamError => StatusCode::BAD_GATEWAY,
            ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Application-specific error types with error codes
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization/deserialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    BadRequest(String),

    #[error("archive error: {0}")]
    BadArchive(String),

    #[error("{0}")]
    NotFound(String),

    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("Internal server error: {0}")]
    InternalError(String),
}

impl AppError {
    /// Get the appropriate error code for this error type
    pub fn error_code(&self) -> ErrorCode {
        match self {
            AppError::BadRequest(_) | AppError::Json(_) | AppError::BadArchive(_) => {
                ErrorCode::ValidationError
            }
            AppError::NotFound(_) => ErrorCode::NotFound,
            AppError::Upstream(_) => ErrorCode::UpstreamError,
            AppError::InternalError(_) | AppError::Io(_) => ErrorCode::InternalError,
        }
    }

    /// Create a standardized error response
    pub fn to_error_response(&self) -> ApiErrorResponse {
        let code = self.error_code();
        ApiErrorResponse {
            error: self.to_string(),
            code: code.as_str().to_string(),
            details: None,
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self, "Request failed");

        let error_response = self.to_error_response();
        let status = self.error_code().http_status();

        tracing::debug!(status = %status, code = %error_response.code, "Returning standardized error response");

        (status, axum::Json(error_response)).into_response()
    }
}

/// Convenient result type for application operations.
pub type AppResult<T> = Result<T, AppError>;
