//! Judge-related error types.

use std::time::Duration;
use thiserror::Error;

/// Errors raised while asking a judge model for a verdict.
#[derive(Debug, Error)]
pub enum JudgeError {
    /// HTTP error from the judge API.
    #[error("HTTP error: {status} - {body}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },

    /// API-level error reported by the provider.
    #[error("API error: {message}")]
    Api {
        /// Error message.
        message: String,
        /// Error code.
        code: Option<String>,
    },

    /// Request timeout.
    #[error("Request timeout after {0:?}")]
    Timeout(Duration),

    /// Rate limited by the API.
    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited {
        /// Suggested retry delay.
        retry_after: Option<Duration>,
    },

    /// Authentication failed.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// The completion could not be interpreted.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The completion did not contain the JSON the caller asked for.
    #[error("Judge returned invalid JSON: {0}")]
    InvalidJson(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Connection error.
    #[error("Connection error: {0}")]
    Connection(String),

    /// JSON serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Other error.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl JudgeError {
    /// Check if this error is transient and a retry could succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            JudgeError::Timeout(_) => true,
            JudgeError::RateLimited { .. } => true,
            JudgeError::Connection(_) => true,
            JudgeError::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Get the retry-after duration if applicable.
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            JudgeError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }

    /// Stable label for the error kind, used in logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            JudgeError::Http { .. } => "http",
            JudgeError::Api { .. } => "api",
            JudgeError::Timeout(_) => "timeout",
            JudgeError::RateLimited { .. } => "rate_limited",
            JudgeError::Authentication(_) => "authentication",
            JudgeError::InvalidResponse(_) => "invalid_response",
            JudgeError::InvalidJson(_) => "invalid_json",
            JudgeError::Configuration(_) => "configuration",
            JudgeError::Connection(_) => "connection",
            JudgeError::Serialization(_) => "serialization",
            JudgeError::Other(_) => "other",
        }
    }

    /// Create an API error.
    pub fn api(message: impl Into<String>) -> Self {
        Self::Api {
            message: message.into(),
            code: None,
        }
    }

    /// Create a rate limited error.
    pub fn rate_limited(retry_after: Option<Duration>) -> Self {
        Self::RateLimited { retry_after }
    }

    /// Create an HTTP error.
    pub fn http(status: u16, body: impl Into<String>) -> Self {
        Self::Http {
            status,
            body: body.into(),
        }
    }

    /// Create an authentication error.
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Authentication(message.into())
    }

    /// Create an invalid response error.
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse(message.into())
    }

    /// Create an invalid JSON error.
    pub fn invalid_json(message: impl Into<String>) -> Self {
        Self::InvalidJson(message.into())
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }
}

impl From<reqwest::Error> for JudgeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            JudgeError::Timeout(Duration::from_secs(120))
        } else if err.is_connect() {
            JudgeError::Connection(err.to_string())
        } else if let Some(status) = err.status() {
            JudgeError::Http {
                status: status.as_u16(),
                body: err.to_string(),
            }
        } else {
            JudgeError::Other(err.into())
        }
    }
}

/// Result type for judge operations.
pub type JudgeResult<T> = Result<T, JudgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_retryable() {
        assert!(JudgeError::Timeout(Duration::from_secs(30)).is_retryable());
        assert!(JudgeError::rate_limited(None).is_retryable());
        assert!(JudgeError::Connection("refused".into()).is_retryable());
        assert!(JudgeError::http(503, "unavailable").is_retryable());

        assert!(!JudgeError::http(400, "bad request").is_retryable());
        assert!(!JudgeError::auth("invalid key").is_retryable());
        assert!(!JudgeError::invalid_json("no object").is_retryable());
        assert!(!JudgeError::configuration("OPENAI_API_KEY not set").is_retryable());
    }

    #[test]
    fn test_retry_after() {
        let err = JudgeError::rate_limited(Some(Duration::from_secs(60)));
        assert_eq!(err.retry_after(), Some(Duration::from_secs(60)));
        assert_eq!(JudgeError::api("boom").retry_after(), None);
    }

    #[test]
    fn test_kind_labels() {
        assert_eq!(JudgeError::http(500, "x").kind(), "http");
        assert_eq!(JudgeError::invalid_json("x").kind(), "invalid_json");
        assert_eq!(JudgeError::configuration("x").kind(), "configuration");
    }

    #[test]
    fn test_error_display() {
        let err = JudgeError::http(404, "Not found");
        assert!(err.to_string().contains("404"));
        let err = JudgeError::configuration("OPENAI_API_KEY environment variable not set");
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }
}
