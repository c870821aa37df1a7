//! # evalbridge-evals
//!
//! LLM-judged evaluation metrics and a batch evaluation engine.
//!
//! ## Core Concepts
//!
//! - **[`LlmTestCase`] / [`ConversationalTestCase`]**: the two shapes a
//!   metric can score
//! - **[`Metric`]**: construct once, then `measure` any number of cases
//! - **[`MetricParams`]**: loosely typed construction arguments
//! - **[`evaluate`]**: runs many metrics over many cases with concurrency,
//!   caching and error policy from [`EvaluateConfig`]
//!
//! ## Built-in Metrics
//!
//! Single-turn: [`AnswerRelevancyMetric`], [`FaithfulnessMetric`],
//! [`ContextualRelevancyMetric`], [`ContextualPrecisionMetric`],
//! [`ContextualRecallMetric`], [`HallucinationMetric`],
//! [`SummarizationMetric`], [`RagasMetric`], [`ToxicityMetric`],
//! [`BiasMetric`], [`GEvalMetric`].
//!
//! Conversational: [`KnowledgeRetentionMetric`],
//! [`ConversationCompletenessMetric`], [`ConversationRelevancyMetric`].
//!
//! ## Example
//!
//! ```ignore
//! use evalbridge_evals::{AnswerRelevancyMetric, LlmTestCase, Metric, MetricParams};
//!
//! let metric = AnswerRelevancyMetric::from_params(&MetricParams::new(), &judges)?;
//! let result = metric
//!     .measure(&LlmTestCase::new("What is 2+2?", "4"))
//!     .await?;
//! println!("{}", result);
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod cache;
pub mod case;
pub mod error;
pub mod metric;
pub mod metrics;
pub mod params;
pub mod report;
pub mod runner;
pub mod verdict;

pub use cache::EvaluationCache;
pub use case::{render_turns, ConversationalTestCase, LlmTestCase, TestCase, TestCaseParam};
pub use error::{EvalError, EvalResult};
pub use metric::{Metric, MetricResult, MetricSettings, ScoreDirection, DEFAULT_THRESHOLD};
pub use metrics::{
    AnswerRelevancyMetric, BiasMetric, ContextualPrecisionMetric, ContextualRecallMetric,
    ContextualRelevancyMetric, ConversationCompletenessMetric, ConversationRelevancyMetric,
    FaithfulnessMetric, GEvalMetric, HallucinationMetric, KnowledgeRetentionMetric, RagasMetric,
    SummarizationMetric, ToxicityMetric,
};
pub use params::{MetricParams, ParamReader, ParamValue};
pub use report::{EvaluationRun, Hyperparameters, MetricData, TestResult};
pub use runner::{evaluate, EvaluateConfig};
