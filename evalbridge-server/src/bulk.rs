//! Batch evaluation over many cases and metrics.

use crate::error::{ServiceError, ServiceResult};
use crate::registry::{MetricRegistry, MetricShape};
use crate::schema::TestCaseResult;
use evalbridge_evals::{
    evaluate, EvaluateConfig, EvaluationCache, Metric, MetricParams, TestResult,
};
use evalbridge_judge::JudgeProvider;
use tracing::{debug, info};

/// Runs named metrics over a list of cases through the engine's batch
/// evaluator.
///
/// Holds no state between calls. Each [`run_bulk`](Self::run_bulk) gets a
/// fresh [`EvaluationCache`], so `use_cache` only reuses results inside the
/// request that produced them.
#[derive(Debug, Clone, Copy)]
pub struct BulkOrchestrator<'a> {
    registry: &'a MetricRegistry,
    judges: &'a dyn JudgeProvider,
}

impl<'a> BulkOrchestrator<'a> {
    /// Create an orchestrator.
    pub fn new(registry: &'a MetricRegistry, judges: &'a dyn JudgeProvider) -> Self {
        Self { registry, judges }
    }

    /// Evaluate every metric on every unit.
    ///
    /// All names are resolved before anything runs, and one unknown name
    /// rejects the whole request. Metrics are built with default parameters.
    /// Results come back in input order with `test_case` set to the index.
    pub async fn run_bulk<C: MetricShape>(
        &self,
        units: &[C],
        metric_names: &[String],
        config: &EvaluateConfig,
    ) -> ServiceResult<Vec<TestCaseResult>> {
        if metric_names.is_empty() {
            return Err(ServiceError::metric_not_supported());
        }
        let constructors = metric_names
            .iter()
            .map(|name| {
                self.registry
                    .lookup::<C>(name)
                    .ok_or_else(|| ServiceError::bulk_metric_not_supported(name))
            })
            .collect::<ServiceResult<Vec<_>>>()?;

        let defaults = MetricParams::new();
        let metrics = constructors
            .into_iter()
            .map(|build| (build)(&defaults, self.judges))
            .collect::<Result<Vec<Box<dyn Metric<C>>>, _>>()?;

        info!(
            shape = C::SHAPE,
            cases = units.len(),
            metrics = ?metric_names,
            "running bulk evaluation"
        );
        let cache = EvaluationCache::new();
        let run = evaluate(units, &metrics, config, &cache).await?;
        debug!(
            passed = run.pass_count(),
            cached = cache.len(),
            duration_ms = run.duration.as_millis() as u64,
            "bulk evaluation done"
        );

        Ok(run.test_results.into_iter().map(aggregate).collect())
    }
}

/// Collapse one case's metric outcomes into a single row.
fn aggregate(result: TestResult) -> TestCaseResult {
    let score = result.average_score().unwrap_or(0.0);
    let reason = result
        .metrics_data
        .iter()
        .filter_map(|m| m.reason.as_ref().map(|r| format!("{}: {}", m.name, r)))
        .collect::<Vec<_>>()
        .join("\n");

    TestCaseResult {
        test_case: result.index,
        score,
        reason,
        is_successful: result.success,
        metrics_data: result.metrics_data,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evalbridge_evals::{ConversationalTestCase, LlmTestCase, MetricData};
    use evalbridge_judge::{FunctionJudge, JudgeError, MockJudge, StaticJudgeProvider};
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn quiet() -> EvaluateConfig {
        EvaluateConfig::new().quiet()
    }

    fn data(name: &str, score: Option<f64>, reason: Option<&str>, success: bool) -> MetricData {
        MetricData {
            name: name.into(),
            threshold: 0.5,
            success,
            score,
            reason: reason.map(Into::into),
            strict_mode: false,
            evaluation_model: Some("mock".into()),
            error: None,
        }
    }

    /// Opinions are extracted per output; outputs mentioning "rude" yield one
    /// toxic opinion.
    fn opinion_judge() -> FunctionJudge {
        FunctionJudge::new("fn-judge", |prompt: &str| {
            let response = if prompt.starts_with("Extract the opinions") {
                if prompt.contains("rude") {
                    r#"{"opinions": ["You are rude."]}"#
                } else {
                    r#"{"opinions": []}"#
                }
            } else if prompt.starts_with("For each opinion") {
                r#"{"verdicts": [{"verdict": "yes", "reason": "insult"}]}"#
            } else {
                r#"{"reason": "Contains an insult."}"#
            };
            Ok(response.to_string())
        })
    }

    #[test]
    fn test_aggregate_mean_and_reasons() {
        let row = aggregate(TestResult::new(
            2,
            vec![
                data("Toxicity", Some(0.0), Some("clean"), true),
                data("Bias", Some(1.0), Some("biased"), false),
            ],
        ));
        assert_eq!(row.test_case, 2);
        assert_eq!(row.score, 0.5);
        assert_eq!(row.reason, "Toxicity: clean\nBias: biased");
        assert!(!row.is_successful);
        assert_eq!(row.metrics_data.len(), 2);
    }

    #[test]
    fn test_aggregate_without_scores() {
        let row = aggregate(TestResult::new(0, Vec::new()));
        assert_eq!(row.score, 0.0);
        assert_eq!(row.reason, "");
        assert!(row.is_successful);
    }

    #[tokio::test]
    async fn test_results_follow_input_order() {
        let registry = MetricRegistry::standard();
        let provider = StaticJudgeProvider::new(opinion_judge());
        let orchestrator = BulkOrchestrator::new(&registry, &provider);

        let units = vec![
            LlmTestCase::new("q0", "Nice day."),
            LlmTestCase::new("q1", "You are rude."),
            LlmTestCase::new("q2", "Lovely."),
        ];
        let results = orchestrator
            .run_bulk(&units, &["Toxicity".to_string()], &quiet())
            .await
            .unwrap();

        let indices: Vec<usize> = results.iter().map(|r| r.test_case).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(results[0].score, 0.0);
        assert!(results[0].is_successful);
        assert_eq!(results[1].score, 1.0);
        assert!(!results[1].is_successful);
        assert_eq!(results[1].reason, "Toxicity: Contains an insult.");
    }

    #[tokio::test]
    async fn test_unknown_name_rejects_everything() {
        let registry = MetricRegistry::standard();
        let judge = MockJudge::new("mock");
        let provider = StaticJudgeProvider::new(judge.clone());
        let orchestrator = BulkOrchestrator::new(&registry, &provider);

        let err = orchestrator
            .run_bulk(
                &[LlmTestCase::new("q", "a")],
                &["Toxicity".to_string(), "Nope".to_string()],
                &quiet(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Metric 'Nope' not supported");
        assert_eq!(judge.call_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_metric_list_rejected() {
        let registry = MetricRegistry::standard();
        let provider = StaticJudgeProvider::new(MockJudge::new("mock"));
        let orchestrator = BulkOrchestrator::new(&registry, &provider);

        let err = orchestrator
            .run_bulk(&[LlmTestCase::new("q", "a")], &[], &quiet())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::MetricNotSupported(_)));
    }

    #[tokio::test]
    async fn test_shape_mismatch_rejected() {
        let registry = MetricRegistry::standard();
        let provider = StaticJudgeProvider::new(MockJudge::new("mock"));
        let orchestrator = BulkOrchestrator::new(&registry, &provider);

        let convo = ConversationalTestCase::new(vec![LlmTestCase::new("hi", "hello")]);
        let err = orchestrator
            .run_bulk(&[convo], &["Toxicity".to_string()], &quiet())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Metric 'Toxicity' not supported");
    }

    #[tokio::test]
    async fn test_judge_failure_aborts_unless_ignored() {
        let registry = MetricRegistry::standard();
        let provider = StaticJudgeProvider::new(FunctionJudge::new("fn-judge", |_: &str| {
            Err(JudgeError::api("upstream down"))
        }));
        let orchestrator = BulkOrchestrator::new(&registry, &provider);
        let units = [LlmTestCase::new("q", "a")];
        let names = ["Bias".to_string()];

        let err = orchestrator
            .run_bulk(&units, &names, &quiet())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Processing(_)));

        let results = orchestrator
            .run_bulk(&units, &names, &quiet().ignore_errors())
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert!(!results[0].is_successful);
        assert_eq!(results[0].score, 0.0);
        assert!(results[0].metrics_data[0].error.is_some());
    }

    #[tokio::test]
    async fn test_cached_results_do_not_outlive_the_call() {
        let registry = MetricRegistry::standard();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let provider = StaticJudgeProvider::new(FunctionJudge::new("fn-judge", move |_: &str| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(r#"{"opinions": []}"#.to_string())
        }));
        let orchestrator = BulkOrchestrator::new(&registry, &provider);
        let names = ["Toxicity".to_string()];
        let config = quiet().sequential().use_cache();

        // Duplicate cases inside one call share the cached measurement.
        let units = [LlmTestCase::new("q", "Nice day."), LlmTestCase::new("q", "Nice day.")];
        let results = orchestrator.run_bulk(&units, &names, &config).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // A second call measures again.
        for round in 2..=5 {
            orchestrator
                .run_bulk(&units[..1], &names, &config)
                .await
                .unwrap();
            assert_eq!(calls.load(Ordering::SeqCst), round);
        }
    }
}
