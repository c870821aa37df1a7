//! Evaluation errors.

use crate::case::TestCaseParam;
use evalbridge_judge::JudgeError;
use thiserror::Error;

/// Errors that can occur while constructing or running metrics.
#[derive(Debug, Error)]
pub enum EvalError {
    /// The test case lacks parameters the metric needs.
    #[error("Missing required test case parameters for {metric}: {}", join_params(.params))]
    MissingParams {
        /// Metric name.
        metric: String,
        /// Missing parameters.
        params: Vec<TestCaseParam>,
    },

    /// A construction parameter was unknown or ill-typed.
    #[error("Invalid parameter '{param}' for {metric}: {message}")]
    InvalidParam {
        /// Metric name.
        metric: String,
        /// Parameter name.
        param: String,
        /// Error message.
        message: String,
    },

    /// The judge call failed.
    #[error(transparent)]
    Judge(#[from] JudgeError),

    /// The judge answered but its verdicts are unusable.
    #[error("Invalid judge verdict: {0}")]
    InvalidVerdict(String),

    /// Batch task execution error.
    #[error("Task execution failed: {0}")]
    TaskFailed(String),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other error.
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

fn join_params(params: &[TestCaseParam]) -> String {
    params
        .iter()
        .map(|p| format!("'{}'", p))
        .collect::<Vec<_>>()
        .join(", ")
}

impl EvalError {
    /// Create a missing params error.
    pub fn missing_params(metric: impl Into<String>, params: Vec<TestCaseParam>) -> Self {
        Self::MissingParams {
            metric: metric.into(),
            params,
        }
    }

    /// Create an invalid param error.
    pub fn invalid_param(
        metric: impl Into<String>,
        param: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidParam {
            metric: metric.into(),
            param: param.into(),
            message: message.into(),
        }
    }

    /// Create an invalid verdict error.
    pub fn invalid_verdict(msg: impl Into<String>) -> Self {
        Self::InvalidVerdict(msg.into())
    }

    /// Create a task failed error.
    pub fn task_failed(msg: impl Into<String>) -> Self {
        Self::TaskFailed(msg.into())
    }

    /// Stable label for the error kind, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingParams { .. } => "missing_params",
            Self::InvalidParam { .. } => "construction",
            Self::Judge(_) => "judge",
            Self::InvalidVerdict(_) => "invalid_verdict",
            Self::TaskFailed(_) => "task_failed",
            Self::Json(_) => "json",
            Self::Other(_) => "other",
        }
    }

    /// Whether retrying the same measurement could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Judge(err) => err.is_retryable(),
            _ => false,
        }
    }
}

/// Result type for evaluation operations.
pub type EvalResult<T> = Result<T, EvalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_params_display() {
        let err = EvalError::missing_params(
            "Hallucination",
            vec![TestCaseParam::Context, TestCaseParam::Input],
        );
        assert_eq!(
            err.to_string(),
            "Missing required test case parameters for Hallucination: 'context', 'input'"
        );
        assert_eq!(err.kind(), "missing_params");
    }

    #[test]
    fn test_invalid_param_display() {
        let err = EvalError::invalid_param("Bias", "threshold", "expected a number");
        let s = err.to_string();
        assert!(s.contains("Bias"));
        assert!(s.contains("threshold"));
        assert_eq!(err.kind(), "construction");
    }

    #[test]
    fn test_judge_error_is_transparent() {
        let err: EvalError = JudgeError::http(503, "unavailable").into();
        assert!(err.to_string().contains("503"));
        assert!(err.is_retryable());
        assert_eq!(err.kind(), "judge");
    }
}
