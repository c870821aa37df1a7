//! Request and response bodies.

use crate::error::{ServiceError, ServiceResult};
use evalbridge_evals::{EvaluateConfig, MetricData, MetricParams, MetricResult};
use serde::{Deserialize, Serialize};

/// Checks a request can run beyond what deserialization enforces.
pub trait Validate {
    /// Reject a body that deserialized but cannot be evaluated.
    fn validate(&self) -> ServiceResult<()>;
}

// ============================================================================
// Requests
// ============================================================================

/// One single-turn interaction as sent over the wire.
///
/// Optional sequences may be absent or `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationUnitRequest {
    /// Prompt presented to the system under test.
    pub input: String,
    /// Response produced by the system under test.
    pub actual_output: String,
    /// Reference answer.
    #[serde(default)]
    pub expected_output: Option<String>,
    /// Ground-truth passages.
    #[serde(default)]
    pub context: Option<Vec<String>>,
    /// Retrieved passages.
    #[serde(default)]
    pub retrieval_context: Option<Vec<String>>,
    /// Tools the system called.
    #[serde(default)]
    pub tools_called: Option<Vec<String>>,
    /// Tools the system was expected to call.
    #[serde(default)]
    pub expected_tools: Option<Vec<String>>,
}

/// A conversation as sent over the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationRequest {
    /// Turns in order.
    pub turns: Vec<EvaluationUnitRequest>,
}

impl Validate for ConversationRequest {
    fn validate(&self) -> ServiceResult<()> {
        if self.turns.is_empty() {
            return Err(ServiceError::invalid_request(
                "test_case.turns must contain at least one turn",
            ));
        }
        Ok(())
    }
}

/// Body of `POST /evaluate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluateRequest {
    /// The interaction to score.
    pub test_case: EvaluationUnitRequest,
    /// Registered metric name. Absence is reported as an unsupported metric.
    #[serde(default)]
    pub metric_name: Option<String>,
    /// Named construction arguments for the metric.
    #[serde(default)]
    pub metric_params: Option<MetricParams>,
}

impl Validate for EvaluateRequest {
    fn validate(&self) -> ServiceResult<()> {
        Ok(())
    }
}

/// Body of `POST /evaluate-conversation`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluateConversationRequest {
    /// The conversation to score.
    pub test_case: ConversationRequest,
    /// Registered conversational metric name.
    #[serde(default)]
    pub metric_name: Option<String>,
    /// Named construction arguments for the metric.
    #[serde(default)]
    pub metric_params: Option<MetricParams>,
}

impl Validate for EvaluateConversationRequest {
    fn validate(&self) -> ServiceResult<()> {
        self.test_case.validate()
    }
}

/// Body of `POST /evaluate-bulk`.
///
/// Every run option sits at the top level next to the cases and is handed to
/// the engine as is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkEvaluateRequest {
    /// Interactions to score.
    pub test_cases: Vec<EvaluationUnitRequest>,
    /// Metric names, each applied with default construction arguments.
    pub metric_names: Vec<String>,
    /// Run options.
    #[serde(flatten)]
    pub config: EvaluateConfig,
}

impl Validate for BulkEvaluateRequest {
    fn validate(&self) -> ServiceResult<()> {
        Ok(())
    }
}

/// Body of `POST /evaluate-bulk-conversation`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkEvaluateConversationRequest {
    /// Conversations to score.
    pub test_cases: Vec<ConversationRequest>,
    /// Conversational metric names.
    pub metric_names: Vec<String>,
    /// Run options.
    #[serde(flatten)]
    pub config: EvaluateConfig,
}

impl Validate for BulkEvaluateConversationRequest {
    fn validate(&self) -> ServiceResult<()> {
        for (i, case) in self.test_cases.iter().enumerate() {
            if case.turns.is_empty() {
                return Err(ServiceError::invalid_request(format!(
                    "test_cases[{}].turns must contain at least one turn",
                    i
                )));
            }
        }
        Ok(())
    }
}

// ============================================================================
// Responses
// ============================================================================

/// Result of a single evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluateResponse {
    /// Metric score.
    pub score: f64,
    /// Explanation, absent when the metric was built without one.
    pub reason: Option<String>,
    /// Whether the score passed the metric's threshold.
    pub is_successful: bool,
}

impl From<MetricResult> for EvaluateResponse {
    fn from(result: MetricResult) -> Self {
        Self {
            score: result.score,
            reason: result.reason,
            is_successful: result.success,
        }
    }
}

/// One case in a bulk response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCaseResult {
    /// Zero-based index of the case in the request.
    pub test_case: usize,
    /// Mean of the produced metric scores, 0.0 when none were produced.
    pub score: f64,
    /// `"<Metric>: <reason>"` lines.
    pub reason: String,
    /// Whether every evaluated metric passed.
    pub is_successful: bool,
    /// Per-metric breakdown.
    pub metrics_data: Vec<MetricData>,
}

/// Result of a bulk evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkEvaluateResponse {
    /// One entry per input case, in input order.
    pub test_case_results: Vec<TestCaseResult>,
}

/// Body of `GET /health`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always `"healthy"`.
    pub status: String,
    /// Service name.
    pub service: String,
    /// Crate version.
    pub version: String,
}

/// Body of `GET /metrics`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsResponse {
    /// Names accepted by the single-turn endpoints, sorted.
    pub single_turn: Vec<String>,
    /// Names accepted by the conversational endpoints, sorted.
    pub conversational: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use evalbridge_evals::ParamValue;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_unit_optional_fields() {
        let unit: EvaluationUnitRequest = serde_json::from_str(
            r#"{"input": "q", "actual_output": "a", "context": null, "retrieval_context": ["r"]}"#,
        )
        .unwrap();
        assert!(unit.context.is_none());
        assert_eq!(unit.retrieval_context, Some(vec!["r".to_string()]));
        assert!(unit.expected_output.is_none());
    }

    #[test]
    fn test_unit_requires_input_and_output() {
        assert!(serde_json::from_str::<EvaluationUnitRequest>(r#"{"input": "q"}"#).is_err());
        assert!(
            serde_json::from_str::<EvaluationUnitRequest>(r#"{"input": 1, "actual_output": "a"}"#)
                .is_err()
        );
    }

    #[test]
    fn test_evaluate_request_params() {
        let req: EvaluateRequest = serde_json::from_str(
            r#"{
                "test_case": {"input": "q", "actual_output": "a"},
                "metric_name": "AnswerRelevancy",
                "metric_params": {"threshold": 0.7, "strict_mode": true, "model": "gpt-4o-mini"}
            }"#,
        )
        .unwrap();
        let params = req.metric_params.unwrap();
        assert_eq!(params["threshold"], ParamValue::Float(0.7));
        assert_eq!(params["strict_mode"], ParamValue::Bool(true));
        assert_eq!(params["model"], ParamValue::Str("gpt-4o-mini".into()));
    }

    #[test]
    fn test_missing_metric_name_deserializes() {
        let req: EvaluateRequest =
            serde_json::from_str(r#"{"test_case": {"input": "q", "actual_output": "a"}}"#).unwrap();
        assert!(req.metric_name.is_none());
    }

    #[test]
    fn test_bulk_config_defaults_and_overrides() {
        let req: BulkEvaluateRequest = serde_json::from_str(
            r#"{"test_cases": [], "metric_names": ["Bias"]}"#,
        )
        .unwrap();
        assert_eq!(req.config, EvaluateConfig::default());

        let req: BulkEvaluateRequest = serde_json::from_str(
            r#"{
                "test_cases": [{"input": "q", "actual_output": "a"}],
                "metric_names": ["Bias"],
                "run_async": false,
                "max_concurrent": 4,
                "throttle_value": 2,
                "ignore_errors": true,
                "verbose_mode": true,
                "hyperparameters": {"model": "my-llm", "temperature": 0.2}
            }"#,
        )
        .unwrap();
        assert!(!req.config.run_async);
        assert_eq!(req.config.max_concurrent, 4);
        assert_eq!(req.config.throttle_value, 2);
        assert!(req.config.ignore_errors);
        assert_eq!(req.config.verbose_mode, Some(true));
        assert_eq!(req.config.hyperparameters["model"], "my-llm");
        assert!(req.config.write_cache);
    }

    #[test]
    fn test_empty_turns_rejected() {
        let req: EvaluateConversationRequest = serde_json::from_str(
            r#"{"test_case": {"turns": []}, "metric_name": "KnowledgeRetention"}"#,
        )
        .unwrap();
        let err = req.validate().unwrap_err();
        assert_eq!(err.code(), "invalid_request");

        let req: BulkEvaluateConversationRequest = serde_json::from_str(
            r#"{
                "test_cases": [{"turns": [{"input": "hi", "actual_output": "hello"}]}, {"turns": []}],
                "metric_names": ["KnowledgeRetention"]
            }"#,
        )
        .unwrap();
        assert!(req.validate().unwrap_err().to_string().contains("test_cases[1]"));
    }

    #[test]
    fn test_response_from_metric_result() {
        let response = EvaluateResponse::from(MetricResult {
            score: 0.8,
            reason: Some("fine".into()),
            success: true,
        });
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            serde_json::json!({"score": 0.8, "reason": "fine", "is_successful": true})
        );
    }
}
