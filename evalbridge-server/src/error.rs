//! Error types for the HTTP adapter.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use evalbridge_evals::EvalError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Detail for single-evaluation requests naming an unknown or empty metric.
pub const METRIC_NOT_SUPPORTED: &str = "Metric not supported or not provided";

/// Errors returned by the evaluation endpoints.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The metric name is unknown, empty, or registered for the other shape.
    #[error("{0}")]
    MetricNotSupported(String),

    /// The request body failed schema validation.
    #[error("{0}")]
    InvalidRequest(String),

    /// Metric construction or measurement failed.
    #[error("Error in processing: {0}")]
    Processing(#[from] EvalError),
}

impl ServiceError {
    /// Unsupported metric on a single-evaluation endpoint.
    pub fn metric_not_supported() -> Self {
        Self::MetricNotSupported(METRIC_NOT_SUPPORTED.to_string())
    }

    /// Unsupported metric named in a bulk request.
    pub fn bulk_metric_not_supported(name: &str) -> Self {
        Self::MetricNotSupported(format!("Metric '{}' not supported", name))
    }

    /// Create an invalid request error.
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MetricNotSupported(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequest(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Processing(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MetricNotSupported(_) => "metric_not_supported",
            Self::InvalidRequest(_) => "invalid_request",
            Self::Processing(_) => "processing_error",
        }
    }
}

/// JSON error body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable message.
    pub detail: String,
    /// Machine-readable code.
    pub code: String,
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        match &self {
            Self::Processing(err) => tracing::error!(
                error = %err,
                error.kind = err.kind(),
                error.retryable = err.is_retryable(),
                "evaluation failed"
            ),
            other => tracing::warn!(code = other.code(), detail = %other, "request rejected"),
        }

        let body = ErrorResponse {
            detail: self.to_string(),
            code: self.code().to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

/// Result alias for handlers.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Errors from starting the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listener could not be bound.
    #[error("Failed to bind to address: {0}")]
    Bind(String),
    /// The server stopped with an error.
    #[error("Server error: {0}")]
    Serve(String),
}
