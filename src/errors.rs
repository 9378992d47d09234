use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;
use std::time::Duration;

/// Errors raised by a document store gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backing store could not be reached (pool closed, connection refused).
    Unavailable(String),
    /// The store was reached but the query failed.
    Query(String),
    /// A row came back but could not be turned into a JSON document.
    Decode(String),
    /// The call did not finish within the per-fetch budget.
    Timeout(Duration),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Unavailable(msg) => write!(f, "store unavailable: {}", msg),
            StoreError::Query(msg) => write!(f, "query failed: {}", msg),
            StoreError::Decode(msg) => write!(f, "undecodable document: {}", msg),
            StoreError::Timeout(after) => write!(f, "timed out after {}ms", after.as_millis()),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<sqlx::Error> for StoreError {
    /// Converts a `sqlx::Error` into a `StoreError`.
    ///
    /// Pool and I/O level failures are reported as `Unavailable`, decode
    /// failures as `Decode`, everything else as `Query`.
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StoreError::Unavailable(err.to_string())
            }
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                StoreError::Decode(err.to_string())
            }
            other => StoreError::Query(other.to_string()),
        }
    }
}

/// Result alias used by every `DocumentStore` operation.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors the aggregation core surfaces to its callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AggregationError {
    /// The mandatory profile document was missing, undecodable or unreachable.
    ProfileNotFound { customer_id: String, reason: String },
    /// The batch contained no identifiers.
    EmptyBatch,
}

impl fmt::Display for AggregationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregationError::ProfileNotFound { reason, .. } => {
                write!(f, "customer not found: {}", reason)
            }
            AggregationError::EmptyBatch => write!(f, "at least one customer_id is required"),
        }
    }
}

impl std::error::Error for AggregationError {}

/// Application-specific error types returned by HTTP handlers.
#[derive(Debug)]
pub enum AppError {
    /// Request body could not be bound or failed boundary validation.
    InvalidRequest(String),
    /// Internal server error.
    InternalError(String),
}

impl fmt::Display for AppError {
    /// Formats the error for display.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
            AppError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl IntoResponse for AppError {
    /// Converts the error into an HTTP response.
    ///
    /// Every variant renders as `{"error": <code>, "message": <text>}`.
    /// Server-side failures are logged and their details withheld.
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::InvalidRequest(msg) => {
                (StatusCode::BAD_REQUEST, "invalid_request", msg.clone())
            }
            AppError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": code,
            "message": message,
        }));

        (status, body).into_response()
    }
}

impl From<AggregationError> for AppError {
    /// `EmptyBatch` is a client mistake; a `ProfileNotFound` escaping the
    /// coordinator would be a bug, since those are reported per identifier.
    fn from(err: AggregationError) -> Self {
        match err {
            AggregationError::EmptyBatch => AppError::InvalidRequest(err.to_string()),
            other => AppError::InternalError(other.to_string()),
        }
    }
}
