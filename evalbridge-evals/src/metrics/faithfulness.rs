//! Faithfulness: whether the answer's claims are backed by retrieved context.

use crate::case::{LlmTestCase, TestCaseParam};
use crate::error::EvalResult;
use crate::metric::{Metric, MetricResult, MetricSettings, ScoreDirection};
use crate::params::{MetricParams, ParamReader};
use crate::verdict::{judge_list, judge_reason, judge_verdicts, numbered, ratio, reasons_where, Verdict};
use async_trait::async_trait;
use evalbridge_judge::JudgeProvider;

const NAME: &str = "Faithfulness";
const REQUIRED: &[TestCaseParam] = &[
    TestCaseParam::Input,
    TestCaseParam::ActualOutput,
    TestCaseParam::RetrievalContext,
];

/// Fraction of claims in `actual_output` that do not contradict
/// `retrieval_context`.
#[derive(Debug, Clone)]
pub struct FaithfulnessMetric {
    settings: MetricSettings,
}

impl FaithfulnessMetric {
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
impl Metric<LlmTestCase> for FaithfulnessMetric {
    judged_metric_accessors!(NAME, ScoreDirection::HigherIsBetter, REQUIRED);

    async fn compute(&self, case: &LlmTestCase) -> EvalResult<MetricResult> {
        let judge = self.settings.judge.as_ref();

        let claims = judge_list(judge, &claims_prompt(&case.actual_output), "claims").await?;
        let verdicts = if claims.is_empty() {
            Vec::new()
        } else {
            judge_verdicts(
                judge,
                &verdicts_prompt(&case.retrieval_context, &claims),
                claims.len(),
            )
            .await?
        };

        let faithful = verdicts.iter().filter(|v| !v.is_no()).count();
        let score = ratio(faithful, verdicts.len(), 1.0);

        let reason = if self.settings.include_reason {
            let contradictions = reasons_where(&verdicts, Verdict::is_no);
            Some(judge_reason(judge, &reason_prompt(score, &contradictions)).await?)
        } else {
            None
        };

        Ok(self
            .settings
            .finalize(ScoreDirection::HigherIsBetter, score, reason))
    }
}

pub(crate) fn claims_prompt(text: &str) -> String {
    format!(
        r#"Extract every factual claim made in the text. Only include claims that
are stated explicitly, not ones that are implied.

Return JSON only: {{"claims": ["...", "..."]}}

Text:
{text}"#
    )
}

fn verdicts_prompt(retrieval_context: &[String], claims: &[String]) -> String {
    format!(
        r#"For each claim, decide whether it is supported by the retrieval context.
Answer "yes" if the context agrees, "no" only if the context directly
contradicts the claim, and "idk" if the context does not say. Give a reason
for every "no".

Return JSON only, one verdict per claim in order:
{{"verdicts": [{{"verdict": "yes|no|idk", "reason": "..."}}]}}

Retrieval context:
{}

Claims:
{}"#,
        numbered(retrieval_context),
        numbered(claims)
    )
}

fn reason_prompt(score: f64, contradictions: &[String]) -> String {
    format!(
        r#"The faithfulness score is {score:.2} (1 means no contradictions).
Explain the score concisely using the contradictions below, if any.

Return JSON only: {{"reason": "..."}}

Contradictions:
{}"#,
        numbered(contradictions)
    )
}
