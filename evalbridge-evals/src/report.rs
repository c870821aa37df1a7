//! Batch evaluation results.

use crate::error::EvalError;
use crate::metric::MetricResult;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Run metadata forwarded by the caller, kept in insertion order.
pub type Hyperparameters = IndexMap<String, serde_json::Value>;

/// One metric's outcome on one test case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricData {
    /// Metric name.
    pub name: String,
    /// Effective threshold.
    pub threshold: f64,
    /// Whether the metric passed.
    pub success: bool,
    /// Score, absent when the metric errored.
    pub score: Option<f64>,
    /// Explanation.
    pub reason: Option<String>,
    /// Whether strict mode was on.
    pub strict_mode: bool,
    /// Judge model name.
    pub evaluation_model: Option<String>,
    /// Error message when the metric failed and errors were ignored.
    pub error: Option<String>,
}

impl MetricData {
    /// Data for a successful measurement.
    pub fn measured(
        name: impl Into<String>,
        threshold: f64,
        strict_mode: bool,
        evaluation_model: Option<String>,
        result: MetricResult,
    ) -> Self {
        Self {
            name: name.into(),
            threshold,
            success: result.success,
            score: Some(result.score),
            reason: result.reason,
            strict_mode,
            evaluation_model,
            error: None,
        }
    }

    /// Data for a measurement that failed.
    pub fn errored(
        name: impl Into<String>,
        threshold: f64,
        strict_mode: bool,
        evaluation_model: Option<String>,
        error: &EvalError,
    ) -> Self {
        Self {
            name: name.into(),
            threshold,
            success: false,
            score: None,
            reason: None,
            strict_mode,
            evaluation_model,
            error: Some(error.to_string()),
        }
    }
}

/// All metric outcomes for one test case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    /// Zero-based position of the case in the input.
    pub index: usize,
    /// Display name.
    pub name: String,
    /// Whether every evaluated metric passed.
    pub success: bool,
    /// Per-metric outcomes, in metric order. Skipped metrics are absent.
    pub metrics_data: Vec<MetricData>,
}

impl TestResult {
    /// Build a result; success is derived from the metric data.
    pub fn new(index: usize, metrics_data: Vec<MetricData>) -> Self {
        Self {
            index,
            name: format!("test_case_{}", index),
            success: metrics_data.iter().all(|m| m.success),
            metrics_data,
        }
    }

    /// Mean of the scores that were produced.
    pub fn average_score(&self) -> Option<f64> {
        let scores: Vec<f64> = self.metrics_data.iter().filter_map(|m| m.score).collect();
        if scores.is_empty() {
            None
        } else {
            Some(scores.iter().sum::<f64>() / scores.len() as f64)
        }
    }
}

/// Output of [`evaluate`](crate::evaluate).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationRun {
    /// Results in input order.
    pub test_results: Vec<TestResult>,
    /// Caller metadata.
    #[serde(default)]
    pub hyperparameters: Hyperparameters,
    /// When the run started.
    pub started_at: chrono::DateTime<chrono::Utc>,
    /// Wall-clock duration.
    #[serde(with = "duration_serde")]
    pub duration: Duration,
}

impl EvaluationRun {
    /// Number of cases where every metric passed.
    pub fn pass_count(&self) -> usize {
        self.test_results.iter().filter(|r| r.success).count()
    }

    /// Share of passing cases.
    pub fn pass_rate(&self) -> f64 {
        if self.test_results.is_empty() {
            0.0
        } else {
            self.pass_count() as f64 / self.test_results.len() as f64
        }
    }

    /// Render as text.
    pub fn to_text(&self) -> String {
        let mut output = String::new();

        output.push_str("\n\u{1F4CA} Evaluation Results\n");
        output.push_str("════════════════════\n\n");
        output.push_str(&format!("Started: {}\n", self.started_at));

        if !self.hyperparameters.is_empty() {
            output.push_str("Hyperparameters:\n");
            for (key, value) in &self.hyperparameters {
                output.push_str(&format!("  {}: {}\n", key, value));
            }
        }

        output.push_str(&format!("\nTotal Cases: {}\n", self.test_results.len()));
        output.push_str(&format!(
            "✅ Passed: {} ({:.1}%)\n",
            self.pass_count(),
            self.pass_rate() * 100.0
        ));
        output.push_str(&format!(
            "❌ Failed: {}\n",
            self.test_results.len() - self.pass_count()
        ));

        for result in &self.test_results {
            output.push_str(&format!("\n{}:\n", result.name));
            for metric in &result.metrics_data {
                let status = if metric.success { "✅" } else { "❌" };
                match (&metric.score, &metric.error) {
                    (Some(score), _) => output.push_str(&format!(
                        "  {} {} (score: {:.2}, threshold: {:.2})\n",
                        status, metric.name, score, metric.threshold
                    )),
                    (None, Some(error)) => output.push_str(&format!(
                        "  ⚠️ {} errored: {}\n",
                        metric.name, error
                    )),
                    (None, None) => {
                        output.push_str(&format!("  {} {}\n", status, metric.name))
                    }
                }
            }
        }

        output.push_str(&format!("\n⏱️ Duration: {:?}\n", self.duration));
        output
    }

    /// Print the text summary to stdout.
    pub fn print_summary(&self) {
        println!("{}", self.to_text());
    }

    /// Render as JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for EvaluationRun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_text())
    }
}

/// Serde helper for Duration.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs_f64().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Ok(Duration::from_secs_f64(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(name: &str, score: f64, success: bool) -> MetricData {
        MetricData::measured(
            name,
            0.5,
            false,
            Some("mock".into()),
            MetricResult {
                score,
                reason: Some("because".into()),
                success,
            },
        )
    }

    fn run(results: Vec<TestResult>) -> EvaluationRun {
        EvaluationRun {
            test_results: results,
            hyperparameters: Hyperparameters::new(),
            started_at: chrono::Utc::now(),
            duration: Duration::from_millis(1500),
        }
    }

    #[test]
    fn test_result_success_requires_all_metrics() {
        let result = TestResult::new(0, vec![data("A", 0.9, true), data("B", 0.1, false)]);
        assert!(!result.success);
        assert_eq!(result.average_score(), Some(0.5));
        assert_eq!(result.name, "test_case_0");

        let empty = TestResult::new(1, vec![]);
        assert!(empty.success);
        assert_eq!(empty.average_score(), None);
    }

    #[test]
    fn test_errored_metric_data() {
        let err = EvalError::invalid_verdict("bad");
        let data = MetricData::errored("A", 0.5, false, None, &err);
        assert!(!data.success);
        assert!(data.score.is_none());
        assert_eq!(data.error.as_deref(), Some("Invalid judge verdict: bad"));
    }

    #[test]
    fn test_run_text() {
        let mut run = run(vec![
            TestResult::new(0, vec![data("Bias", 0.0, true)]),
            TestResult::new(1, vec![data("Bias", 0.9, false)]),
        ]);
        run.hyperparameters
            .insert("model".into(), serde_json::json!("gpt-4o"));

        assert_eq!(run.pass_rate(), 0.5);
        let text = run.to_text();
        assert!(text.contains("Total Cases: 2"));
        assert!(text.contains("model: \"gpt-4o\""));
        assert!(text.contains("test_case_1:"));
    }

    #[test]
    fn test_run_json_duration_in_seconds() {
        let json = run(vec![]).to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["duration"], serde_json::json!(1.5));
    }
}
