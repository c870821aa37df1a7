//! Summarization: factual alignment and coverage of a summary.
//!
//! `input` holds the source text and `actual_output` the summary. The score
//! is the lower of two sub-scores:
//!
//! - **alignment**: share of summary claims that do not contradict the source
//! - **coverage**: share of judge-generated yes/no questions about the source
//!   that the summary answers the same way the source does

use super::faithfulness::claims_prompt;
use crate::case::{LlmTestCase, TestCaseParam};
use crate::error::EvalResult;
use crate::metric::{Metric, MetricResult, MetricSettings, ScoreDirection};
use crate::params::{MetricParams, ParamReader};
use crate::verdict::{judge_list, judge_reason, judge_verdicts, numbered, ratio, reasons_where};
use async_trait::async_trait;
use evalbridge_judge::{Judge, JudgeProvider};

const NAME: &str = "Summarization";
const REQUIRED: &[TestCaseParam] = &[TestCaseParam::Input, TestCaseParam::ActualOutput];

/// Default number of coverage questions.
pub const DEFAULT_QUESTIONS: usize = 5;

/// Scores a summary against its source text.
#[derive(Debug, Clone)]
pub struct SummarizationMetric {
    settings: MetricSettings,
    n: usize,
}

impl SummarizationMetric {
    /// Create the metric.
    pub fn new(settings: MetricSettings) -> Self {
        Self {
            settings,
            n: DEFAULT_QUESTIONS,
        }
    }

    /// Set the number of coverage questions.
    pub fn with_questions(mut self, n: usize) -> Self {
        self.n = n.max(1);
        self
    }

    fn fingerprint_extra(&self) -> serde_json::Value {
        serde_json::json!({ "n": self.n })
    }

    /// Build from named parameters; accepts `n` on top of the common ones.
    pub fn from_params(params: &MetricParams, judges: &dyn JudgeProvider) -> EvalResult<Self> {
        let mut reader = ParamReader::new(NAME, params);
        let settings = MetricSettings::read(&mut reader, judges)?;
        let n = reader.positive_int("n")?;
        reader.finish()?;
        Ok(Self::new(settings).with_questions(n.unwrap_or(DEFAULT_QUESTIONS)))
    }

    async fn alignment(&self, judge: &dyn Judge, case: &LlmTestCase) -> EvalResult<(f64, Vec<String>)> {
        let claims = judge_list(judge, &claims_prompt(&case.actual_output), "claims").await?;
        if claims.is_empty() {
            return Ok((1.0, Vec::new()));
        }
        let prompt = format!(
            r#"For each claim taken from a summary, decide whether the original text
supports it. Answer "yes" if it does, "no" if the original text contradicts
it, and "idk" if the original text does not say. Give a reason for every "no"
and "idk".

Return JSON only, one verdict per claim in order:
{{"verdicts": [{{"verdict": "yes|no|idk", "reason": "..."}}]}}

Original text:
{}

Claims:
{}"#,
            case.input,
            numbered(&claims)
        );
        let verdicts = judge_verdicts(judge, &prompt, claims.len()).await?;
        let aligned = verdicts.iter().filter(|v| !v.is_no()).count();
        Ok((
            ratio(aligned, verdicts.len(), 1.0),
            reasons_where(&verdicts, |v| !v.is_yes()),
        ))
    }

    async fn coverage(&self, judge: &dyn Judge, case: &LlmTestCase) -> EvalResult<(f64, Vec<String>)> {
        let prompt = format!(
            r#"Write {} closed-ended questions that can be answered with "yes" from
the text below. The questions must be about its most important points.

Return JSON only: {{"questions": ["...", "..."]}}

Text:
{}"#,
            self.n, case.input
        );
        let mut questions = judge_list(judge, &prompt, "questions").await?;
        questions.truncate(self.n);
        if questions.is_empty() {
            return Ok((1.0, Vec::new()));
        }

        let source = judge_verdicts(judge, &answers_prompt(&case.input, &questions), questions.len())
            .await?;
        let summary = judge_verdicts(
            judge,
            &answers_prompt(&case.actual_output, &questions),
            questions.len(),
        )
        .await?;

        let mut matched = 0;
        let mut gaps = Vec::new();
        for ((question, from_source), from_summary) in questions.iter().zip(&source).zip(&summary) {
            if from_source.verdict == from_summary.verdict {
                matched += 1;
            } else {
                gaps.push(format!(
                    "{} (source: {}, summary: {})",
                    question, from_source.verdict, from_summary.verdict
                ));
            }
        }
        Ok((ratio(matched, questions.len(), 1.0), gaps))
    }
}

fn answers_prompt(text: &str, questions: &[String]) -> String {
    format!(
        r#"Answer each question using only the text below. Answer "yes" or "no",
or "idk" if the text does not contain the answer.

Return JSON only, one verdict per question in order:
{{"verdicts": [{{"verdict": "yes|no|idk"}}]}}

Text:
{text}

Questions:
{}"#,
        numbered(questions)
    )
}

#[async_trait]
impl Metric<LlmTestCase> for SummarizationMetric {
    judged_metric_accessors!(
        NAME,
        ScoreDirection::HigherIsBetter,
        REQUIRED,
        fingerprint = fingerprint_extra
    );

    async fn compute(&self, case: &LlmTestCase) -> EvalResult<MetricResult> {
        let judge = self.settings.judge.as_ref();

        let (alignment, contradictions) = self.alignment(judge, case).await?;
        let (coverage, gaps) = self.coverage(judge, case).await?;
        let score = alignment.min(coverage);
        tracing::debug!(alignment, coverage, "summarization sub-scores");

        let reason = if self.settings.include_reason {
            let prompt = format!(
                r#"The summarization score is {score:.2}: alignment {alignment:.2},
coverage {coverage:.2}. Explain the score concisely.

Return JSON only: {{"reason": "..."}}

Claims not supported by the original text:
{}

Questions the summary answers differently:
{}"#,
                numbered(&contradictions),
                numbered(&gaps)
            );
            Some(judge_reason(judge, &prompt).await?)
        } else {
            None
        };

        Ok(self
            .settings
            .finalize(ScoreDirection::HigherIsBetter, score, reason))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::testing::mock_settings;
    use crate::params::ParamValue;
    use evalbridge_judge::{MockJudge, StaticJudgeProvider};

    fn case() -> LlmTestCase {
        LlmTestCase::new(
            "The company grew revenue by 20% and hired 50 engineers in 2023.",
            "Revenue grew 20% in 2023.",
        )
    }

    #[tokio::test]
    async fn test_score_is_min_of_alignment_and_coverage() {
        let judge = MockJudge::new("mock")
            .with_response(r#"{"claims": ["Revenue grew 20% in 2023."]}"#)
            .with_response(r#"{"verdicts": [{"verdict": "yes"}]}"#)
            .with_response(r#"{"questions": ["Did revenue grow?", "Were engineers hired?"]}"#)
            .with_response(r#"{"verdicts": [{"verdict": "yes"}, {"verdict": "yes"}]}"#)
            .with_response(r#"{"verdicts": [{"verdict": "yes"}, {"verdict": "idk"}]}"#)
            .with_response(r#"{"reason": "The summary omits hiring."}"#);
        let metric = SummarizationMetric::new(mock_settings(&judge)).with_questions(2);

        let result = metric.measure(&case()).await.unwrap();
        assert_eq!(result.score, 0.5);
        assert!(result.success);
        assert_eq!(judge.call_count(), 6);
        assert!(judge.recorded_prompts()[5].contains("Were engineers hired?"));
    }

    #[tokio::test]
    async fn test_extra_questions_are_truncated() {
        let judge = MockJudge::new("mock")
            .with_response(r#"{"claims": []}"#)
            .with_response(r#"{"questions": ["a?", "b?"]}"#)
            .with_response(r#"{"verdicts": [{"verdict": "yes"}]}"#)
            .with_response(r#"{"verdicts": [{"verdict": "yes"}]}"#);
        let metric = SummarizationMetric::new(mock_settings(&judge).with_include_reason(false))
            .with_questions(1);

        let result = metric.measure(&case()).await.unwrap();
        assert_eq!(result.score, 1.0);
    }

    #[test]
    fn test_n_param() {
        let provider = StaticJudgeProvider::new(MockJudge::new("mock"));
        let mut params = MetricParams::new();
        params.insert("n".into(), ParamValue::Int(3));
        let metric = SummarizationMetric::from_params(&params, &provider).unwrap();
        assert_eq!(metric.n, 3);

        params.insert("n".into(), ParamValue::Int(0));
        assert!(SummarizationMetric::from_params(&params, &provider).is_err());
    }

    #[test]
    fn test_question_count_in_fingerprint() {
        let judge = MockJudge::new("mock");
        let default = SummarizationMetric::new(mock_settings(&judge));
        let three = SummarizationMetric::new(mock_settings(&judge)).with_questions(3);
        assert_ne!(default.cache_fingerprint(), three.cache_fingerprint());
        assert_eq!(three.cache_fingerprint()["extra"]["n"], 3);
    }
}
