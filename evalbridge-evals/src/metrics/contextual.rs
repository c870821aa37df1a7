//! Retrieval-quality metrics over `retrieval_context`.
//!
//! - [`ContextualRelevancyMetric`]: how much of the retrieved context matters
//!   for the input
//! - [`ContextualPrecisionMetric`]: whether useful nodes are ranked first
//! - [`ContextualRecallMetric`]: how much of the expected output the
//!   retrieved context accounts for

use crate::case::{LlmTestCase, TestCaseParam};
use crate::error::EvalResult;
use crate::metric::{Metric, MetricResult, MetricSettings, ScoreDirection};
use crate::params::{MetricParams, ParamReader};
use crate::verdict::{judge_reason, judge_verdicts, numbered, ratio, reasons_where, Verdict};
use async_trait::async_trait;
use evalbridge_judge::JudgeProvider;
use once_cell::sync::Lazy;
use regex::Regex;

static SENTENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^.!?\n]+[.!?]*").unwrap());

fn read_settings(
    name: &str,
    params: &MetricParams,
    judges: &dyn JudgeProvider,
) -> EvalResult<MetricSettings> {
    let mut reader = ParamReader::new(name, params);
    let settings = MetricSettings::read(&mut reader, judges)?;
    reader.finish()?;
    Ok(settings)
}

// ============================================================================
// Contextual relevancy
// ============================================================================

const RELEVANCY_NAME: &str = "Contextual Relevancy";
const RELEVANCY_REQUIRED: &[TestCaseParam] = &[
    TestCaseParam::Input,
    TestCaseParam::ActualOutput,
    TestCaseParam::RetrievalContext,
];

/// Fraction of retrieval nodes relevant to `input`.
#[derive(Debug, Clone)]
pub struct ContextualRelevancyMetric {
    settings: MetricSettings,
}

impl ContextualRelevancyMetric {
    /// Create the metric.
    pub fn new(settings: MetricSettings) -> Self {
        Self { settings }
    }

    /// Build from named parameters.
    pub fn from_params(params: &MetricParams, judges: &dyn JudgeProvider) -> EvalResult<Self> {
        read_settings(RELEVANCY_NAME, params, judges).map(Self::new)
    }
}

#[async_trait]
impl Metric<LlmTestCase> for ContextualRelevancyMetric {
    judged_metric_accessors!(
        RELEVANCY_NAME,
        ScoreDirection::HigherIsBetter,
        RELEVANCY_REQUIRED
    );

    async fn compute(&self, case: &LlmTestCase) -> EvalResult<MetricResult> {
        let judge = self.settings.judge.as_ref();
        let nodes = &case.retrieval_context;

        let prompt = format!(
            r#"For each node of retrieval context, decide whether it is relevant to
the input. Answer "yes" or "no", with a reason for each "no".

Return JSON only, one verdict per node in order:
{{"verdicts": [{{"verdict": "yes|no", "reason": "..."}}]}}

Input:
{}

Nodes:
{}"#,
            case.input,
            numbered(nodes)
        );
        let verdicts = judge_verdicts(judge, &prompt, nodes.len()).await?;
        let relevant = verdicts.iter().filter(|v| v.is_yes()).count();
        let score = ratio(relevant, verdicts.len(), 0.0);

        let reason = if self.settings.include_reason {
            let irrelevant = reasons_where(&verdicts, Verdict::is_no);
            let prompt = format!(
                r#"The contextual relevancy score is {score:.2}. Explain it concisely
using the reasons nodes were judged irrelevant.

Return JSON only: {{"reason": "..."}}

Input:
{}

Irrelevancy reasons:
{}"#,
                case.input,
                numbered(&irrelevant)
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

// ============================================================================
// Contextual precision
// ============================================================================

const PRECISION_NAME: &str = "Contextual Precision";
const PRECISION_REQUIRED: &[TestCaseParam] = &[
    TestCaseParam::Input,
    TestCaseParam::ActualOutput,
    TestCaseParam::ExpectedOutput,
    TestCaseParam::RetrievalContext,
];

/// Weighted cumulative precision of the retrieval ranking.
#[derive(Debug, Clone)]
pub struct ContextualPrecisionMetric {
    settings: MetricSettings,
}

impl ContextualPrecisionMetric {
    /// Create the metric.
    pub fn new(settings: MetricSettings) -> Self {
        Self { settings }
    }

    /// Build from named parameters.
    pub fn from_params(params: &MetricParams, judges: &dyn JudgeProvider) -> EvalResult<Self> {
        read_settings(PRECISION_NAME, params, judges).map(Self::new)
    }
}

/// Mean of precision@k over the positions holding a useful node.
fn weighted_precision(verdicts: &[Verdict]) -> f64 {
    let mut relevant = 0usize;
    let mut sum = 0.0;
    for (k, verdict) in verdicts.iter().enumerate() {
        if verdict.is_yes() {
            relevant += 1;
            sum += relevant as f64 / (k + 1) as f64;
        }
    }
    if relevant == 0 {
        0.0
    } else {
        sum / relevant as f64
    }
}

#[async_trait]
impl Metric<LlmTestCase> for ContextualPrecisionMetric {
    judged_metric_accessors!(
        PRECISION_NAME,
        ScoreDirection::HigherIsBetter,
        PRECISION_REQUIRED
    );

    async fn compute(&self, case: &LlmTestCase) -> EvalResult<MetricResult> {
        let judge = self.settings.judge.as_ref();
        let nodes = &case.retrieval_context;
        let expected = case.expected_output.as_deref().unwrap_or_default();

        let prompt = format!(
            r#"For each node of retrieval context, decide whether it was useful in
arriving at the expected output for the input. Answer "yes" or "no" and give a
short reason for every verdict.

Return JSON only, one verdict per node in order:
{{"verdicts": [{{"verdict": "yes|no", "reason": "..."}}]}}

Input:
{}

Expected output:
{}

Nodes:
{}"#,
            case.input,
            expected,
            numbered(nodes)
        );
        let verdicts = judge_verdicts(judge, &prompt, nodes.len()).await?;
        let score = weighted_precision(&verdicts);

        let reason = if self.settings.include_reason {
            let ranking = verdicts
                .iter()
                .enumerate()
                .map(|(i, v)| {
                    format!(
                        "node {}: {} ({})",
                        i + 1,
                        v.verdict,
                        v.reason.as_deref().unwrap_or("no reason given")
                    )
                })
                .collect::<Vec<_>>()
                .join("\n");
            let prompt = format!(
                r#"The contextual precision score is {score:.2}. It is high when useful
nodes are ranked above useless ones. Explain the score concisely, referring to
nodes by position.

Return JSON only: {{"reason": "..."}}

Ranking:
{ranking}"#
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

// ============================================================================
// Contextual recall
// ============================================================================

const RECALL_NAME: &str = "Contextual Recall";
const RECALL_REQUIRED: &[TestCaseParam] = &[
    TestCaseParam::Input,
    TestCaseParam::ActualOutput,
    TestCaseParam::ExpectedOutput,
    TestCaseParam::RetrievalContext,
];

/// Fraction of expected-output sentences attributable to the retrieval context.
#[derive(Debug, Clone)]
pub struct ContextualRecallMetric {
    settings: MetricSettings,
}

impl ContextualRecallMetric {
    /// Create the metric.
    pub fn new(settings: MetricSettings) -> Self {
        Self { settings }
    }

    /// Build from named parameters.
    pub fn from_params(params: &MetricParams, judges: &dyn JudgeProvider) -> EvalResult<Self> {
        read_settings(RECALL_NAME, params, judges).map(Self::new)
    }
}

fn sentences(text: &str) -> Vec<String> {
    SENTENCE
        .find_iter(text)
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[async_trait]
impl Metric<LlmTestCase> for ContextualRecallMetric {
    judged_metric_accessors!(RECALL_NAME, ScoreDirection::HigherIsBetter, RECALL_REQUIRED);

    async fn compute(&self, case: &LlmTestCase) -> EvalResult<MetricResult> {
        let judge = self.settings.judge.as_ref();
        let sentences = sentences(case.expected_output.as_deref().unwrap_or_default());

        let verdicts = if sentences.is_empty() {
            Vec::new()
        } else {
            let prompt = format!(
                r#"For each sentence of the expected output, decide whether it can be
attributed to any node of the retrieval context. Answer "yes" or "no" with a
short reason.

Return JSON only, one verdict per sentence in order:
{{"verdicts": [{{"verdict": "yes|no", "reason": "..."}}]}}

Retrieval context:
{}

Sentences:
{}"#,
                numbered(&case.retrieval_context),
                numbered(&sentences)
            );
            judge_verdicts(judge, &prompt, sentences.len()).await?
        };
        let attributable = verdicts.iter().filter(|v| v.is_yes()).count();
        let score = ratio(attributable, verdicts.len(), 0.0);

        let reason = if self.settings.include_reason {
            let supported = reasons_where(&verdicts, Verdict::is_yes);
            let unsupported = reasons_where(&verdicts, Verdict::is_no);
            let prompt = format!(
                r#"The contextual recall score is {score:.2}. Explain it concisely.

Return JSON only: {{"reason": "..."}}

Supported sentences:
{}

Unsupported sentences:
{}"#,
                numbered(&supported),
                numbered(&unsupported)
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
