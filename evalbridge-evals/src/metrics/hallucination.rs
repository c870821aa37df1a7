//! Hallucination: how often the answer contradicts ground-truth context.

use crate::case::{LlmTestCase, TestCaseParam};
use crate::error::EvalResult;
use crate::metric::{Metric, MetricResult, MetricSettings, ScoreDirection};
use crate::params::{MetricParams, ParamReader};
use crate::verdict::{judge_reason, judge_verdicts, numbered, ratio, reasons_where, Verdict};
use async_trait::async_trait;
use evalbridge_judge::JudgeProvider;

const NAME: &str = "Hallucination";
const REQUIRED: &[TestCaseParam] = &[
    TestCaseParam::Input,
    TestCaseParam::ActualOutput,
    TestCaseParam::Context,
];

/// Fraction of `context` passages contradicted by `actual_output`.
///
/// Lower is better.
#[derive(Debug, Clone)]
pub struct HallucinationMetric {
    settings: MetricSettings,
}

impl HallucinationMetric {
    /// Create the metric.
    pub fn new(settings: MetricSettings) -> Self {
        Self { settings }
    }

    /// Build from named parameters.
    pub fn from_params(params: &MetricParams, judges: &dyn JudgeProvider) -> EvalResult<Self> {
        let mut reader = ParamReader::new(NAME, params);
        let settings = MetricSettings::read(&mut reader, judges)?;
        reader.finish()?;
        Ok(Self::new(settings))
    }
}

#[async_trait]
impl Metric<LlmTestCase> for HallucinationMetric {
    judged_metric_accessors!(NAME, ScoreDirection::LowerIsBetter, REQUIRED);

    async fn compute(&self, case: &LlmTestCase) -> EvalResult<MetricResult> {
        let judge = self.settings.judge.as_ref();

        let prompt = format!(
            r#"For each context passage, decide whether the actual output agrees with
it. Answer "yes" if it agrees and "no" if it contradicts the passage. Give a
reason for every verdict.

Return JSON only, one verdict per passage in order:
{{"verdicts": [{{"verdict": "yes|no", "reason": "..."}}]}}

Actual output:
{}

Context:
{}"#,
            case.actual_output,
            numbered(&case.context)
        );
        let verdicts = judge_verdicts(judge, &prompt, case.context.len()).await?;
        let contradictions = verdicts.iter().filter(|v| v.is_no()).count();
        let score = ratio(contradictions, verdicts.len(), 0.0);

        let reason = if self.settings.include_reason {
            let factual = reasons_where(&verdicts, Verdict::is_yes);
            let contradicted = reasons_where(&verdicts, Verdict::is_no);
            let prompt = format!(
                r#"The hallucination score is {score:.2} (0 means no contradictions).
Explain the score concisely.

Return JSON only: {{"reason": "..."}}

Agreements:
{}

Contradictions:
{}"#,
                numbered(&factual),
                numbered(&contradicted)
            );
            Some(judge_reason(judge, &prompt).await?)
        } else {
            None
        };

        Ok(self
            .settings
            .finalize(ScoreDirection::LowerIsBetter, score, reason))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::testing::mock_settings;
    use evalbridge_judge::MockJudge;

    fn case() -> LlmTestCase {
        LlmTestCase::new("Where is the Eiffel Tower?", "It is in Berlin.")
            .with_context(["The Eiffel Tower is in Paris.", "It was built in 1889."])
    }

    #[tokio::test]
    async fn test_contradiction_counts_against() {
        let judge = MockJudge::new("mock")
            .with_response(
                r#"{"verdicts": [{"verdict": "no", "reason": "Paris, not Berlin"}, {"verdict": "yes", "reason": "no conflict"}]}"#,
            )
            .with_response(r#"{"reason": "The location contradicts the context."}"#);
        let metric = HallucinationMetric::new(mock_settings(&judge).with_threshold(0.3));

        let result = metric.measure(&case()).await.unwrap();
        assert_eq!(result.score, 0.5);
        assert!(!result.success);
        assert_eq!(metric.threshold(), 0.3);
    }

    #[tokio::test]
    async fn test_no_contradictions_passes() {
        let judge = MockJudge::new("mock")
            .with_response(r#"{"verdicts": [{"verdict": "yes"}, {"verdict": "yes"}]}"#);
        let metric = HallucinationMetric::new(mock_settings(&judge).with_include_reason(false));

        let result = metric.measure(&case()).await.unwrap();
        assert_eq!(result.score, 0.0);
        assert!(result.success);
    }

    #[tokio::test]
    async fn test_strict_threshold_is_zero() {
        let judge = MockJudge::new("mock");
        let metric = HallucinationMetric::new(mock_settings(&judge).with_strict_mode(true));
        assert_eq!(metric.threshold(), 0.0);
        assert!(metric.strict_mode());
    }

    #[tokio::test]
    async fn test_requires_context() {
        let judge = MockJudge::new("mock");
        let metric = HallucinationMetric::new(mock_settings(&judge));

        let err = metric
            .measure(&LlmTestCase::new("q", "a").with_retrieval_context(["r"]))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("'context'"));
    }
}
