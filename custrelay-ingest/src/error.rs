//! Error types for custrelay-ingest

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Fatal ingestion pipeline errors.
///
/// A record rejected by the update service is not represented here — the
/// pipeline logs it and moves on. Everything below aborts the whole batch.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The input ended before a header row could be read
    #[error("missing header row")]
    MissingHeader,

    /// A row had the wrong field count or an unparseable id
    #[error("malformed row: {0}")]
    MalformedRow(String),

    /// The CSV reader failed to produce a row
    #[error("failed to read CSV row: {0}")]
    Csv(#[from] csv::Error),

    /// The deadline or cancellation signal fired at a row boundary
    #[error("ingestion cancelled")]
    Cancelled,

    /// The update session failed (transport, closed session, cancellation)
    #[error(transparent)]
    Update(#[from] custrelay_common::Error),
}

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request payload (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Upload exceeds the configured maximum size (413)
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// The request deadline expired before ingestion finished (504)
    #[error("Deadline exceeded: {0}")]
    Timeout(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<IngestError> for ApiError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::MissingHeader | IngestError::MalformedRow(_) | IngestError::Csv(_) => {
                ApiError::BadRequest(err.to_string())
            }
            IngestError::Cancelled => ApiError::Timeout(err.to_string()),
            IngestError::Update(custrelay_common::Error::Cancelled) => {
                ApiError::Timeout("deadline expired during update".to_string())
            }
            IngestError::Update(inner) => ApiError::Internal(inner.to_string()),
        }
    }
}

impl From<custrelay_common::Error> for ApiError {
    fn from(err: custrelay_common::Error) -> Self {
        ApiError::from(IngestError::Update(err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::PayloadTooLarge(msg) => {
                (StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE", msg)
            }
            ApiError::Timeout(msg) => (StatusCode::GATEWAY_TIMEOUT, "TIMEOUT", msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
            ApiError::Io(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "IO_ERROR",
                err.to_string(),
            ),
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
