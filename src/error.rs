//! # Error Handling
//!
//! This module defines custom error types and how they're converted to HTTP responses.
//!
//! ## Error surfaces:
//! - **AppError**: request-level failures, converted into JSON HTTP responses
//!   via the `ResponseError` trait.
//! - **PipelineError**: failures inside one analysis pipeline run. These never
//!   become HTTP responses directly; the orchestrator turns them into a terminal
//!   `error` event on the session's push channel (foundational steps) or a
//!   degraded analyzer verdict (independent steps).
//!
//! ## JSON Response Format:
//! All request errors return JSON with a consistent structure:
//! ```json
//! {
//!   "error": {
//!     "type": "session_not_found",
//!     "message": "No session with id abc123",
//!     "timestamp": "2025-01-01T12:00:00Z"
//!   }
//! }
//! ```

use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use std::fmt;

/// Custom error types for the application.
///
/// ## Error Categories:
/// - **Internal**: Server-side problems (500 errors)
/// - **BadRequest**: Client sent invalid data (400 errors)
/// - **SessionNotFound**: The referenced analysis session doesn't exist (404 errors)
/// - **PayloadTooLarge**: Upload exceeded the configured size cap (413 errors)
/// - **ConfigError**: Configuration problems (500 errors)
/// - **ValidationError**: Data validation failed (400 errors)
#[derive(Debug)]
pub enum AppError {
    /// Internal server errors (I/O failures, poisoned locks, etc.)
    Internal(String),

    /// Client sent invalid or malformed data
    BadRequest(String),

    /// The referenced analysis session does not exist.
    /// Session existence is an explicit precondition for history and record
    /// operations; nothing is auto-created on lookup paths.
    SessionNotFound(String),

    /// Uploaded audio exceeded the configured size limit
    PayloadTooLarge(String),

    /// The server is at its concurrent-run limit
    Busy(String),

    /// Configuration file or environment variable problems
    ConfigError(String),

    /// User input failed validation rules
    ValidationError(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::SessionNotFound(id) => write!(f, "No session with id {}", id),
            AppError::PayloadTooLarge(msg) => write!(f, "Payload too large: {}", msg),
            AppError::Busy(msg) => write!(f, "Server busy: {}", msg),
            AppError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            AppError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
        }
    }
}

/// Converts application errors into the JSON error envelope clients consume.
///
/// ## HTTP Status Code Mapping:
/// - Internal/ConfigError → 500 (Internal Server Error)
/// - BadRequest/ValidationError → 400 (Bad Request)
/// - SessionNotFound → 404 (Not Found)
/// - PayloadTooLarge → 413 (Payload Too Large)
/// - Busy → 503 (Service Unavailable)
impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let (status, error_type, message) = match self {
            AppError::Internal(msg) => (
                actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                msg.clone(),
            ),
            AppError::BadRequest(msg) => (
                actix_web::http::StatusCode::BAD_REQUEST,
                "bad_request",
                msg.clone(),
            ),
            AppError::SessionNotFound(id) => (
                actix_web::http::StatusCode::NOT_FOUND,
                "session_not_found",
                format!("No session with id {}", id),
            ),
            AppError::PayloadTooLarge(msg) => (
                actix_web::http::StatusCode::PAYLOAD_TOO_LARGE,
                "payload_too_large",
                msg.clone(),
            ),
            AppError::Busy(msg) => (
                actix_web::http::StatusCode::SERVICE_UNAVAILABLE,
                "server_busy",
                msg.clone(),
            ),
            AppError::ConfigError(msg) => (
                actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
                "config_error",
                msg.clone(),
            ),
            AppError::ValidationError(msg) => (
                actix_web::http::StatusCode::BAD_REQUEST,
                "validation_error",
                msg.clone(),
            ),
        };

        HttpResponse::build(status).json(json!({
            "error": {
                "type": error_type,
                "message": message,
                "timestamp": chrono::Utc::now().to_rfc3339()
            }
        }))
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

/// JSON parsing failures are almost always malformed client input,
/// so they map to 400 rather than 500.
impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest(format!("JSON parsing error: {}", err))
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal(format!("I/O error: {}", err))
    }
}

/// Type alias for Results that use our custom error type.
pub type AppResult<T> = Result<T, AppError>;

/// Failures raised by one analysis pipeline run.
///
/// ## Failure policy (asymmetric, by design):
/// A `Collaborator` or `Timeout` error during a foundational step (audio
/// quality, transcription, emotion) aborts the run. The same error during an
/// independent text analyzer is caught by the orchestrator and demoted to a
/// degraded verdict for that one analyzer.
#[derive(Debug)]
pub enum PipelineError {
    /// An external collaborator returned an error for the named step
    Collaborator { step: String, message: String },

    /// An external collaborator exceeded the configured per-call deadline
    Timeout { step: String, deadline_secs: u64 },

    /// Reading or removing the uploaded audio artifact failed
    Io(std::io::Error),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::Collaborator { step, message } => {
                write!(f, "{} failed: {}", step, message)
            }
            PipelineError::Timeout {
                step,
                deadline_secs,
            } => {
                write!(f, "{} timed out after {}s", step, deadline_secs)
            }
            PipelineError::Io(err) => write!(f, "audio artifact I/O error: {}", err),
        }
    }
}

impl std::error::Error for PipelineError {}

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        PipelineError::Io(err)
    }
}

impl PipelineError {
    /// Convenience constructor for collaborator failures.
    pub fn collaborator(step: &str, message: impl Into<String>) -> Self {
        PipelineError::Collaborator {
            step: step.to_string(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AppError::SessionNotFound("abc123".to_string());
        assert_eq!(err.to_string(), "No session with id abc123");

        let err = PipelineError::collaborator("transcription", "decoder crashed");
        assert_eq!(err.to_string(), "transcription failed: decoder crashed");

        let err = PipelineError::Timeout {
            step: "emotion".to_string(),
            deadline_secs: 60,
        };
        assert_eq!(err.to_string(), "emotion timed out after 60s");
    }

    #[test]
    fn test_error_response_status() {
        use actix_web::http::StatusCode;

        let err = AppError::SessionNotFound("x".to_string());
        assert_eq!(err.error_response().status(), StatusCode::NOT_FOUND);

        let err = AppError::PayloadTooLarge("26MB > 25MB".to_string());
        assert_eq!(err.error_response().status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}
