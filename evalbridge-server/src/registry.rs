//! Metric name to constructor tables.
//!
//! Single-turn and conversational metrics live in separate tables typed by
//! the test case shape they accept. [`MetricShape`] picks the table from the
//! case type, so a conversational name can never resolve for a single-turn
//! case or the other way round.

use evalbridge_evals::{
    AnswerRelevancyMetric, BiasMetric, ContextualPrecisionMetric, ContextualRecallMetric,
    ContextualRelevancyMetric, ConversationCompletenessMetric, ConversationRelevancyMetric,
    ConversationalTestCase, EvalResult, FaithfulnessMetric, GEvalMetric, HallucinationMetric,
    KnowledgeRetentionMetric, LlmTestCase, Metric, MetricParams, RagasMetric, SummarizationMetric,
    TestCase, ToxicityMetric,
};
use evalbridge_judge::JudgeProvider;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Builds a metric from named parameters.
pub type MetricConstructor<C> = Arc<
    dyn Fn(&MetricParams, &dyn JudgeProvider) -> EvalResult<Box<dyn Metric<C>>> + Send + Sync,
>;

/// Wrap a concrete `from_params` style function as a [`MetricConstructor`].
pub fn constructor<C, M, F>(build: F) -> MetricConstructor<C>
where
    C: TestCase + 'static,
    M: Metric<C> + 'static,
    F: Fn(&MetricParams, &dyn JudgeProvider) -> EvalResult<M> + Send + Sync + 'static,
{
    Arc::new(
        move |params: &MetricParams, judges: &dyn JudgeProvider| -> EvalResult<Box<dyn Metric<C>>> {
            Ok(Box::new(build(params, judges)?) as Box<dyn Metric<C>>)
        },
    )
}

/// Constructors for one test case shape, keyed by exact name.
pub struct MetricTable<C> {
    entries: BTreeMap<String, MetricConstructor<C>>,
}

impl<C> MetricTable<C> {
    fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Constructor registered under `name`, case-sensitive.
    pub fn get(&self, name: &str) -> Option<&MetricConstructor<C>> {
        self.entries.get(name)
    }

    /// Whether `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    /// Number of registered metrics.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<C> fmt::Debug for MetricTable<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.entries.keys()).finish()
    }
}

/// A test case shape with its own metric table.
pub trait MetricShape: TestCase + Sized + 'static {
    /// Shape label used in logs.
    const SHAPE: &'static str;

    /// The table holding metrics for this shape.
    fn table(registry: &MetricRegistry) -> &MetricTable<Self>;
}

impl MetricShape for LlmTestCase {
    const SHAPE: &'static str = "single_turn";

    fn table(registry: &MetricRegistry) -> &MetricTable<Self> {
        &registry.single_turn
    }
}

impl MetricShape for ConversationalTestCase {
    const SHAPE: &'static str = "conversational";

    fn table(registry: &MetricRegistry) -> &MetricTable<Self> {
        &registry.conversational
    }
}

/// Immutable name-to-constructor mapping shared by every request.
#[derive(Debug)]
pub struct MetricRegistry {
    single_turn: MetricTable<LlmTestCase>,
    conversational: MetricTable<ConversationalTestCase>,
}

impl Default for MetricRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

impl MetricRegistry {
    /// Registry with every built-in metric.
    pub fn standard() -> Self {
        Self::builder().with_builtin_metrics().build()
    }

    /// Start an empty registry.
    pub fn builder() -> MetricRegistryBuilder {
        MetricRegistryBuilder::default()
    }

    /// Constructor for `name` in the table matching `C`.
    pub fn lookup<C: MetricShape>(&self, name: &str) -> Option<&MetricConstructor<C>> {
        C::table(self).get(name)
    }

    /// Sorted single-turn metric names.
    pub fn single_turn_names(&self) -> Vec<String> {
        self.single_turn.names()
    }

    /// Sorted conversational metric names.
    pub fn conversational_names(&self) -> Vec<String> {
        self.conversational.names()
    }
}

/// Assembles a [`MetricRegistry`].
pub struct MetricRegistryBuilder {
    single_turn: MetricTable<LlmTestCase>,
    conversational: MetricTable<ConversationalTestCase>,
}

impl Default for MetricRegistryBuilder {
    fn default() -> Self {
        Self {
            single_turn: MetricTable::new(),
            conversational: MetricTable::new(),
        }
    }
}

impl MetricRegistryBuilder {
    /// Register a single-turn metric, replacing any existing entry.
    pub fn single_turn(
        mut self,
        name: impl Into<String>,
        constructor: MetricConstructor<LlmTestCase>,
    ) -> Self {
        self.single_turn.entries.insert(name.into(), constructor);
        self
    }

    /// Register a conversational metric, replacing any existing entry.
    pub fn conversational(
        mut self,
        name: impl Into<String>,
        constructor: MetricConstructor<ConversationalTestCase>,
    ) -> Self {
        self.conversational.entries.insert(name.into(), constructor);
        self
    }

    /// Register the built-in metrics.
    pub fn with_builtin_metrics(self) -> Self {
        self.single_turn("AnswerRelevancy", constructor(AnswerRelevancyMetric::from_params))
            .single_turn("Hallucination", constructor(HallucinationMetric::from_params))
            .single_turn("Summarization", constructor(SummarizationMetric::from_params))
            .single_turn("Faithfulness", constructor(FaithfulnessMetric::from_params))
            .single_turn(
                "ContextualRelevancy",
                constructor(ContextualRelevancyMetric::from_params),
            )
            .single_turn(
                "ContextualPrecision",
                constructor(ContextualPrecisionMetric::from_params),
            )
            .single_turn("ContextualRecall", constructor(ContextualRecallMetric::from_params))
            .single_turn("Ragas", constructor(RagasMetric::from_params))
            .single_turn("Toxicity", constructor(ToxicityMetric::from_params))
            .single_turn("Bias", constructor(BiasMetric::from_params))
            .single_turn("GEval", constructor(GEvalMetric::from_params))
            .conversational(
                "KnowledgeRetention",
                constructor(KnowledgeRetentionMetric::from_params),
            )
            .conversational(
                "ConversationCompleteness",
                constructor(ConversationCompletenessMetric::from_params),
            )
            .conversational(
                "ConversationRelevancy",
                constructor(ConversationRelevancyMetric::from_params),
            )
    }

    /// Freeze the registry.
    pub fn build(self) -> MetricRegistry {
        MetricRegistry {
            single_turn: self.single_turn,
            conversational: self.conversational,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evalbridge_evals::ParamValue;
    use evalbridge_judge::{MockJudge, StaticJudgeProvider};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_standard_names() {
        let registry = MetricRegistry::standard();
        assert_eq!(
            registry.single_turn_names(),
            vec![
                "AnswerRelevancy",
                "Bias",
                "ContextualPrecision",
                "ContextualRecall",
                "ContextualRelevancy",
                "Faithfulness",
                "GEval",
                "Hallucination",
                "Ragas",
                "Summarization",
                "Toxicity",
            ]
        );
        assert_eq!(
            registry.conversational_names(),
            vec![
                "ConversationCompleteness",
                "ConversationRelevancy",
                "KnowledgeRetention",
            ]
        );
    }

    #[test]
    fn test_namespaces_are_disjoint() {
        let registry = MetricRegistry::standard();
        assert!(registry.lookup::<LlmTestCase>("Faithfulness").is_some());
        assert!(registry.lookup::<ConversationalTestCase>("Faithfulness").is_none());
        assert!(registry.lookup::<ConversationalTestCase>("KnowledgeRetention").is_some());
        assert!(registry.lookup::<LlmTestCase>("KnowledgeRetention").is_none());
    }

    #[test]
    fn test_lookup_is_exact() {
        let registry = MetricRegistry::standard();
        assert!(registry.lookup::<LlmTestCase>("faithfulness").is_none());
        assert!(registry.lookup::<LlmTestCase>(" Faithfulness").is_none());
        assert!(registry.lookup::<LlmTestCase>("").is_none());
    }

    #[test]
    fn test_constructor_forwards_params() {
        let registry = MetricRegistry::standard();
        let provider = StaticJudgeProvider::new(MockJudge::new("mock"));
        let build = registry.lookup::<LlmTestCase>("Toxicity").unwrap();

        let mut params = MetricParams::new();
        params.insert("threshold".into(), ParamValue::Float(0.2));
        let metric = build(&params, &provider).unwrap();
        assert_eq!(metric.name(), "Toxicity");
        assert_eq!(metric.threshold(), 0.2);

        params.insert("nonsense".into(), ParamValue::Bool(true));
        assert!(build(&params, &provider).is_err());
    }

    #[test]
    fn test_builder_registers_custom_metric() {
        let registry = MetricRegistry::builder()
            .single_turn("Strict Bias", constructor(|params: &MetricParams, judges: &dyn JudgeProvider| {
                let mut params = params.clone();
                params.insert("strict_mode".into(), ParamValue::Bool(true));
                BiasMetric::from_params(&params, judges)
            }))
            .build();

        assert_eq!(registry.single_turn_names(), vec!["Strict Bias"]);
        assert!(registry.conversational_names().is_empty());

        let provider = StaticJudgeProvider::new(MockJudge::new("mock"));
        let metric = registry.lookup::<LlmTestCase>("Strict Bias").unwrap()(
            &MetricParams::new(),
            &provider,
        )
        .unwrap();
        assert!(metric.strict_mode());
    }
}
