//! Answer relevancy: how much of the answer addresses the question.

use crate::case::{LlmTestCase, TestCaseParam};
use crate::error::EvalResult;
use crate::metric::{Metric, MetricResult, MetricSettings, ScoreDirection};
use crate::params::{MetricParams, ParamReader};
use crate::verdict::{judge_list, judge_reason, judge_verdicts, numbered, ratio, reasons_where, Verdict};
use async_trait::async_trait;
use evalbridge_judge::JudgeProvider;

const NAME: &str = "Answer Relevancy";
const REQUIRED: &[TestCaseParam] = &[TestCaseParam::Input, TestCaseParam::ActualOutput];

/// Fraction of statements in `actual_output` that are relevant to `input`.
#[derive(Debug, Clone)]
pub struct AnswerRelevancyMetric {
    settings: MetricSettings,
}

impl AnswerRelevancyMetric {
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
impl Metric<LlmTestCase> for AnswerRelevancyMetric {
    judged_metric_accessors!(NAME, ScoreDirection::HigherIsBetter, REQUIRED);

    async fn compute(&self, case: &LlmTestCase) -> EvalResult<MetricResult> {
        let judge = self.settings.judge.as_ref();

        let statements =
            judge_list(judge, &statements_prompt(&case.actual_output), "statements").await?;
        let verdicts = if statements.is_empty() {
            Vec::new()
        } else {
            judge_verdicts(judge, &verdicts_prompt(&case.input, &statements), statements.len())
                .await?
        };

        let relevant = verdicts.iter().filter(|v| !v.is_no()).count();
        let score = ratio(relevant, verdicts.len(), 1.0);

        let reason = if self.settings.include_reason {
            let irrelevant = reasons_where(&verdicts, Verdict::is_no);
            Some(judge_reason(judge, &reason_prompt(&case.input, score, &irrelevant)).await?)
        } else {
            None
        };

        Ok(self
            .settings
            .finalize(ScoreDirection::HigherIsBetter, score, reason))
    }
}

fn statements_prompt(actual_output: &str) -> String {
    format!(
        r#"Break the following text into standalone statements. Ambiguous fragments
still count as statements.

Return JSON only, in the form {{"statements": ["...", "..."]}}.

Text:
{actual_output}"#
    )
}

fn verdicts_prompt(input: &str, statements: &[String]) -> String {
    format!(
        r#"For each statement, decide whether it is relevant to the input.
Answer "yes" if it is, "no" if it is not, and "idk" if it is ambiguous but
could support the answer. Give a reason only for "no" verdicts.

Return JSON only, one verdict per statement in order:
{{"verdicts": [{{"verdict": "yes|no|idk", "reason": "..."}}]}}

Input:
{input}

Statements:
{}"#,
        numbered(statements)
    )
}

fn reason_prompt(input: &str, score: f64, irrelevant: &[String]) -> String {
    format!(
        r#"The answer relevancy score is {score:.2} (1 means fully relevant).
Explain the score concisely, citing the irrelevant statements if any.

Return JSON only: {{"reason": "..."}}

Input:
{input}

Reasons for irrelevant statements:
{}"#,
        numbered(irrelevant)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EvalError;
    use crate::metrics::testing::mock_settings;
    use crate::params::ParamValue;
    use evalbridge_judge::{MockJudge, StaticJudgeProvider};

    fn case() -> LlmTestCase {
        LlmTestCase::new("What is the capital of France?", "Paris. It has a tower. I like cats.")
    }

    #[tokio::test]
    async fn test_partial_relevance() {
        let judge = MockJudge::new("mock")
            .with_response(r#"{"statements": ["Paris.", "It has a tower.", "I like cats."]}"#)
            .with_response(
                r#"{"verdicts": [
                    {"verdict": "yes"},
                    {"verdict": "idk"},
                    {"verdict": "no", "reason": "cats are unrelated"}
                ]}"#,
            )
            .with_response(r#"{"reason": "One statement is off topic."}"#);
        let metric = AnswerRelevancyMetric::new(mock_settings(&judge));

        let result = metric.measure(&case()).await.unwrap();
        assert!((result.score - 2.0 / 3.0).abs() < 1e-9);
        assert!(result.success);
        assert_eq!(result.reason.as_deref(), Some("One statement is off topic."));
        assert!(judge.recorded_prompts()[2].contains("cats are unrelated"));
    }

    #[tokio::test]
    async fn test_no_statements_scores_one() {
        let judge = MockJudge::new("mock")
            .with_response(r#"{"statements": []}"#)
            .with_response(r#"{"reason": "Nothing to judge."}"#);
        let metric = AnswerRelevancyMetric::new(mock_settings(&judge));

        let result = metric.measure(&case()).await.unwrap();
        assert_eq!(result.score, 1.0);
        assert_eq!(judge.call_count(), 2);
    }

    #[tokio::test]
    async fn test_without_reason() {
        let judge = MockJudge::new("mock")
            .with_response(r#"{"statements": ["Paris."]}"#)
            .with_response(r#"{"verdicts": [{"verdict": "no"}]}"#);
        let metric =
            AnswerRelevancyMetric::new(mock_settings(&judge).with_include_reason(false));

        let result = metric.measure(&case()).await.unwrap();
        assert_eq!(result.score, 0.0);
        assert!(!result.success);
        assert!(result.reason.is_none());
        assert_eq!(judge.call_count(), 2);
    }

    #[tokio::test]
    async fn test_missing_output_fails_before_judging() {
        let judge = MockJudge::new("mock");
        let metric = AnswerRelevancyMetric::new(mock_settings(&judge));

        let err = metric
            .measure(&LlmTestCase::new("question", ""))
            .await
            .unwrap_err();
        assert!(matches!(err, EvalError::MissingParams { .. }));
        assert_eq!(judge.call_count(), 0);
    }

    #[test]
    fn test_from_params() {
        let provider = StaticJudgeProvider::new(MockJudge::new("mock"));
        let mut params = MetricParams::new();
        params.insert("threshold".into(), ParamValue::Float(0.7));
        let metric = AnswerRelevancyMetric::from_params(&params, &provider).unwrap();
        assert_eq!(metric.threshold(), 0.7);
        assert_eq!(metric.name(), "Answer Relevancy");
        assert_eq!(metric.evaluation_model(), Some("mock"));

        params.insert("bogus".into(), ParamValue::Int(1));
        let err = AnswerRelevancyMetric::from_params(&params, &provider).unwrap_err();
        assert!(matches!(err, EvalError::InvalidParam { .. }));
    }
}
