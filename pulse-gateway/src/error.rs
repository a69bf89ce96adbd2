//! Error types for pulse-gateway
//!
//! Batch-level input problems map to 400, read-path failures of the event
//! logger to 502. Per-record problems never reach this layer; they only show
//! up in the upload counts.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::checkin::coach::CoachError;
use crate::ingest::IngestError;
use crate::logger_client::LoggerError;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Upstream collaborator failed (502)
    #[error("Bad gateway: {0}")]
    BadGateway(String),

    /// Collaborator not configured (503)
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Upload could not be parsed or reconciled
    #[error(transparent)]
    Ingest(#[from] IngestError),
}

impl From<LoggerError> for ApiError {
    fn from(err: LoggerError) -> Self {
        ApiError::BadGateway(format!("Could not fetch data from event logger: {}", err))
    }
}

impl From<CoachError> for ApiError {
    fn from(err: CoachError) -> Self {
        match err {
            CoachError::NotConfigured => ApiError::ServiceUnavailable(err.to_string()),
            other => ApiError::BadGateway(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, "BAD_GATEWAY", msg),
            ApiError::ServiceUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE", msg)
            }
            ApiError::Ingest(ref err) => (StatusCode::BAD_REQUEST, "INVALID_UPLOAD", err.to_string()),
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
