//! RAGAS: composite score over four retrieval-augmented generation metrics.

use super::{
    AnswerRelevancyMetric, ContextualPrecisionMetric, ContextualRecallMetric, FaithfulnessMetric,
};
use crate::case::{LlmTestCase, TestCaseParam};
use crate::error::EvalResult;
use crate::metric::{Metric, MetricResult, MetricSettings, ScoreDirection};
use crate::params::{MetricParams, ParamReader};
use async_trait::async_trait;
use evalbridge_judge::JudgeProvider;

const NAME: &str = "RAGAS";
const REQUIRED: &[TestCaseParam] = &[
    TestCaseParam::Input,
    TestCaseParam::ActualOutput,
    TestCaseParam::ExpectedOutput,
    TestCaseParam::RetrievalContext,
];

/// Mean of answer relevancy, faithfulness, contextual precision and
/// contextual recall. The four components run concurrently.
#[derive(Debug, Clone)]
pub struct RagasMetric {
    settings: MetricSettings,
    answer_relevancy: AnswerRelevancyMetric,
    faithfulness: FaithfulnessMetric,
    contextual_precision: ContextualPrecisionMetric,
    contextual_recall: ContextualRecallMetric,
}

impl RagasMetric {
    /// Create the metric. Components share the judge but skip reasons.
    pub fn new(settings: MetricSettings) -> Self {
        let component = settings
            .clone()
            .with_include_reason(false)
            .with_strict_mode(false);
        Self {
            answer_relevancy: AnswerRelevancyMetric::new(component.clone()),
            faithfulness: FaithfulnessMetric::new(component.clone()),
            contextual_precision: ContextualPrecisionMetric::new(component.clone()),
            contextual_recall: ContextualRecallMetric::new(component),
            settings,
        }
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
impl Metric<LlmTestCase> for RagasMetric {
    judged_metric_accessors!(NAME, ScoreDirection::HigherIsBetter, REQUIRED);

    async fn compute(&self, case: &LlmTestCase) -> EvalResult<MetricResult> {
        let (relevancy, faithfulness, precision, recall) = futures::try_join!(
            self.answer_relevancy.measure(case),
            self.faithfulness.measure(case),
            self.contextual_precision.measure(case),
            self.contextual_recall.measure(case),
        )?;

        let parts = [
            (self.answer_relevancy.name(), relevancy.score),
            (self.faithfulness.name(), faithfulness.score),
            (self.contextual_precision.name(), precision.score),
            (self.contextual_recall.name(), recall.score),
        ];
        let score = parts.iter().map(|(_, s)| s).sum::<f64>() / parts.len() as f64;
        let reason = parts
            .iter()
            .map(|(name, s)| format!("{}: {:.2}", name, s))
            .collect::<Vec<_>>()
            .join(", ");

        Ok(self
            .settings
            .finalize(ScoreDirection::HigherIsBetter, score, Some(reason)))
    }
}
