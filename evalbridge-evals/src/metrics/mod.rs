//! Built-in LLM-judged metrics.
//!
//! Single-turn metrics implement [`Metric<LlmTestCase>`](crate::Metric);
//! conversational ones implement `Metric<ConversationalTestCase>`. Every
//! metric is built from [`MetricParams`](crate::MetricParams) through its
//! `from_params` constructor, which is what the service registry stores.

/// Expands to the accessor half of a `Metric` impl for structs holding a
/// `settings: MetricSettings` field.
///
/// Metrics with extra result-changing options pass `fingerprint = method`,
/// naming an inherent method that returns those options as JSON.
macro_rules! judged_metric_accessors {
    (@accessors $name:expr, $direction:expr, $params:expr) => {
        fn name(&self) -> &str {
            $name
        }

        fn threshold(&self) -> f64 {
            self.settings.effective_threshold($direction)
        }

        fn strict_mode(&self) -> bool {
            self.settings.strict_mode
        }

        fn evaluation_model(&self) -> Option<&str> {
            Some(self.settings.model_name())
        }

        fn required_params(&self) -> &[$crate::case::TestCaseParam] {
            $params
        }
    };
    ($name:expr, $direction:expr, $params:expr) => {
        judged_metric_accessors!(@accessors $name, $direction, $params);

        fn cache_fingerprint(&self) -> serde_json::Value {
            self.settings.fingerprint(serde_json::Value::Null)
        }
    };
    ($name:expr, $direction:expr, $params:expr, fingerprint = $extra:ident) => {
        judged_metric_accessors!(@accessors $name, $direction, $params);

        fn cache_fingerprint(&self) -> serde_json::Value {
            self.settings.fingerprint(self.$extra())
        }
    };
}

mod answer_relevancy;
mod contextual;
mod conversational;
mod faithfulness;
mod g_eval;
mod hallucination;
mod ragas;
mod safety;
mod summarization;

pub use answer_relevancy::AnswerRelevancyMetric;
pub use contextual::{ContextualPrecisionMetric, ContextualRecallMetric, ContextualRelevancyMetric};
pub use conversational::{
    ConversationCompletenessMetric, ConversationRelevancyMetric, KnowledgeRetentionMetric,
};
pub use faithfulness::FaithfulnessMetric;
pub use g_eval::GEvalMetric;
pub use hallucination::HallucinationMetric;
pub use ragas::RagasMetric;
pub use safety::{BiasMetric, ToxicityMetric};
pub use summarization::SummarizationMetric;

#[cfg(test)]
pub(crate) mod testing {
    use crate::metric::MetricSettings;
    use evalbridge_judge::{FunctionJudge, JudgeResult, MockJudge};
    use std::sync::Arc;

    /// Settings around a queue-driven judge.
    pub fn mock_settings(judge: &MockJudge) -> MetricSettings {
        MetricSettings::new(Arc::new(judge.clone()))
    }

    /// Settings around a prompt-driven judge.
    pub fn fn_settings<F>(f: F) -> MetricSettings
    where
        F: Fn(&str) -> JudgeResult<String> + Send + Sync + 'static,
    {
        MetricSettings::new(Arc::new(FunctionJudge::new("fn-judge", f)))
    }
}
