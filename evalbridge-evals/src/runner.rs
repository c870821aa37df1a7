//! Batch evaluation.

use crate::cache::EvaluationCache;
use crate::case::TestCase;
use crate::error::{EvalError, EvalResult};
use crate::metric::Metric;
use crate::report::{EvaluationRun, Hyperparameters, MetricData, TestResult};
use futures::future::{join_all, try_join_all};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Options for [`evaluate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluateConfig {
    /// Caller metadata attached to the run.
    pub hyperparameters: Hyperparameters,
    /// Evaluate cases concurrently.
    pub run_async: bool,
    /// Seconds between consecutive case launches in async mode.
    pub throttle_value: u64,
    /// Maximum cases in flight in async mode.
    pub max_concurrent: usize,
    /// Skip metrics whose required test case fields are missing.
    pub skip_on_missing_params: bool,
    /// Record failing metrics instead of aborting the run.
    pub ignore_errors: bool,
    /// Log every metric result.
    pub verbose_mode: Option<bool>,
    /// Store measured results in the cache.
    pub write_cache: bool,
    /// Serve results from the cache when present.
    pub use_cache: bool,
    /// Log progress as cases complete.
    pub show_indicator: bool,
    /// Print a summary to stdout after the run.
    pub print_results: bool,
}

impl Default for EvaluateConfig {
    fn default() -> Self {
        Self {
            hyperparameters: Hyperparameters::new(),
            run_async: true,
            throttle_value: 0,
            max_concurrent: 100,
            skip_on_missing_params: false,
            ignore_errors: false,
            verbose_mode: None,
            write_cache: true,
            use_cache: false,
            show_indicator: true,
            print_results: true,
        }
    }
}

impl EvaluateConfig {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run cases one after another.
    pub fn sequential(mut self) -> Self {
        self.run_async = false;
        self
    }

    /// Set the concurrency limit.
    pub fn max_concurrent(mut self, n: usize) -> Self {
        self.max_concurrent = n.max(1);
        self
    }

    /// Record errors instead of aborting.
    pub fn ignore_errors(mut self) -> Self {
        self.ignore_errors = true;
        self
    }

    /// Skip metrics with missing parameters.
    pub fn skip_on_missing_params(mut self) -> Self {
        self.skip_on_missing_params = true;
        self
    }

    /// Read from the cache.
    pub fn use_cache(mut self) -> Self {
        self.use_cache = true;
        self
    }

    /// Disable stdout output and progress logging.
    pub fn quiet(mut self) -> Self {
        self.print_results = false;
        self.show_indicator = false;
        self
    }
}

struct Progress {
    total: usize,
    done: AtomicUsize,
    enabled: bool,
}

impl Progress {
    fn tick(&self) {
        let done = self.done.fetch_add(1, Ordering::Relaxed) + 1;
        if self.enabled {
            info!(completed = done, total = self.total, "evaluation progress");
        }
    }
}

/// Evaluate every metric on every test case.
///
/// Results come back in input order regardless of `run_async`. The first
/// metric failure aborts the run unless `ignore_errors` is set.
pub async fn evaluate<C: TestCase>(
    test_cases: &[C],
    metrics: &[Box<dyn Metric<C>>],
    config: &EvaluateConfig,
    cache: &EvaluationCache,
) -> EvalResult<EvaluationRun> {
    let started_at = chrono::Utc::now();
    let start = Instant::now();

    info!(
        cases = test_cases.len(),
        metrics = metrics.len(),
        run_async = config.run_async,
        max_concurrent = config.max_concurrent,
        "starting evaluation"
    );
    if !config.hyperparameters.is_empty() {
        info!(hyperparameters = ?config.hyperparameters, "evaluation hyperparameters");
    }

    let progress = Progress {
        total: test_cases.len(),
        done: AtomicUsize::new(0),
        enabled: config.show_indicator,
    };

    let test_results = if config.run_async {
        let semaphore = Semaphore::new(config.max_concurrent.max(1));
        let semaphore = &semaphore;
        let progress = &progress;

        let tasks = test_cases.iter().enumerate().map(|(index, case)| async move {
            if config.throttle_value > 0 && index > 0 {
                let delay = Duration::from_secs(config.throttle_value.saturating_mul(index as u64));
                tokio::time::sleep(delay).await;
            }
            let _permit = semaphore
                .acquire()
                .await
                .map_err(|e| EvalError::task_failed(e.to_string()))?;
            let result = evaluate_case(index, case, metrics, config, cache, true).await?;
            progress.tick();
            Ok::<_, EvalError>(result)
        });
        try_join_all(tasks).await?
    } else {
        let mut results = Vec::with_capacity(test_cases.len());
        for (index, case) in test_cases.iter().enumerate() {
            results.push(evaluate_case(index, case, metrics, config, cache, false).await?);
            progress.tick();
        }
        results
    };

    let run = EvaluationRun {
        test_results,
        hyperparameters: config.hyperparameters.clone(),
        started_at,
        duration: start.elapsed(),
    };

    info!(
        cases = run.test_results.len(),
        passed = run.pass_count(),
        duration_ms = run.duration.as_millis() as u64,
        "evaluation finished"
    );
    if config.print_results {
        run.print_summary();
    }
    Ok(run)
}

async fn evaluate_case<C: TestCase>(
    index: usize,
    case: &C,
    metrics: &[Box<dyn Metric<C>>],
    config: &EvaluateConfig,
    cache: &EvaluationCache,
    concurrent: bool,
) -> EvalResult<TestResult> {
    let outcomes = if concurrent {
        join_all(
            metrics
                .iter()
                .map(|metric| evaluate_metric(case, metric.as_ref(), config, cache)),
        )
        .await
    } else {
        let mut outcomes = Vec::with_capacity(metrics.len());
        for metric in metrics {
            outcomes.push(evaluate_metric(case, metric.as_ref(), config, cache).await);
        }
        outcomes
    };

    let metrics_data = outcomes
        .into_iter()
        .collect::<EvalResult<Vec<_>>>()?
        .into_iter()
        .flatten()
        .collect();
    Ok(TestResult::new(index, metrics_data))
}

/// Measure one metric; `None` means it was skipped.
async fn evaluate_metric<C: TestCase>(
    case: &C,
    metric: &dyn Metric<C>,
    config: &EvaluateConfig,
    cache: &EvaluationCache,
) -> EvalResult<Option<MetricData>> {
    let name = metric.name();
    let key = if config.use_cache || config.write_cache {
        Some(EvaluationCache::key(
            case,
            name,
            metric.threshold(),
            metric.strict_mode(),
            metric.evaluation_model(),
            &metric.cache_fingerprint(),
        )?)
    } else {
        None
    };

    if config.use_cache {
        if let Some(hit) = key.as_deref().and_then(|k| cache.get(k)) {
            debug!(metric = name, "cache hit");
            return Ok(Some(hit));
        }
    }

    let model = metric.evaluation_model().map(str::to_string);
    let data = match metric.measure(case).await {
        Ok(result) => MetricData::measured(
            name,
            metric.threshold(),
            metric.strict_mode(),
            model,
            result,
        ),
        Err(EvalError::MissingParams { params, .. }) if config.skip_on_missing_params => {
            debug!(metric = name, missing = ?params, "skipping metric");
            return Ok(None);
        }
        Err(err) if config.ignore_errors => {
            warn!(
                metric = name,
                error = %err,
                error.kind = err.kind(),
                "metric failed, recording error"
            );
            MetricData::errored(name, metric.threshold(), metric.strict_mode(), model, &err)
        }
        Err(err) => return Err(err),
    };

    if config.verbose_mode == Some(true) {
        info!(
            metric = name,
            score = ?data.score,
            success = data.success,
            reason = ?data.reason,
            "metric result"
        );
    }

    if config.write_cache && data.error.is_none() {
        if let Some(key) = key {
            cache.insert(key, data.clone());
        }
    }
    Ok(Some(data))
}
