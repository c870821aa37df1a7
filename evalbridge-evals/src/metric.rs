//! The metric trait and settings shared by every built-in metric.

use crate::case::{TestCase, TestCaseParam};
use crate::error::{EvalError, EvalResult};
use crate::params::ParamReader;
use async_trait::async_trait;
use evalbridge_judge::{Judge, JudgeProvider};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Default pass threshold.
pub const DEFAULT_THRESHOLD: f64 = 0.5;

/// Outcome of a single measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricResult {
    /// Score in `[0, 1]`.
    pub score: f64,
    /// Explanation of the score, when reasons are enabled.
    pub reason: Option<String>,
    /// Whether the score passes the metric's threshold.
    pub success: bool,
}

impl fmt::Display for MetricResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.success { "PASS" } else { "FAIL" };
        write!(f, "{} ({:.3})", status, self.score)?;
        if let Some(reason) = &self.reason {
            write!(f, ": {}", reason)?;
        }
        Ok(())
    }
}

/// Which side of the threshold counts as a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreDirection {
    /// Pass when `score >= threshold`.
    HigherIsBetter,
    /// Pass when `score <= threshold`.
    LowerIsBetter,
}

/// A measurement over one test case shape.
///
/// `C` ties the metric to either single-turn or conversational cases, so a
/// metric can only ever be applied to the shape it was written for.
#[async_trait]
pub trait Metric<C: TestCase>: Send + Sync {
    /// Human-readable metric name.
    fn name(&self) -> &str;

    /// Effective pass threshold.
    fn threshold(&self) -> f64;

    /// Whether strict (binary) scoring is on.
    fn strict_mode(&self) -> bool;

    /// Name of the judge model, if the metric uses one.
    fn evaluation_model(&self) -> Option<&str>;

    /// Test case fields the metric reads.
    fn required_params(&self) -> &[TestCaseParam];

    /// Configuration that changes results but is not covered by the name,
    /// threshold, strict mode or model. Folded into result cache keys.
    fn cache_fingerprint(&self) -> serde_json::Value {
        serde_json::Value::Null
    }

    /// Check required parameters, then compute the score.
    async fn measure(&self, case: &C) -> EvalResult<MetricResult> {
        let missing = case.missing_params(self.required_params());
        if !missing.is_empty() {
            return Err(EvalError::missing_params(self.name(), missing));
        }
        self.compute(case).await
    }

    /// Compute the score for a case that has every required parameter.
    async fn compute(&self, case: &C) -> EvalResult<MetricResult>;
}

/// Construction options every built-in metric accepts.
#[derive(Debug, Clone)]
pub struct MetricSettings {
    /// Pass threshold.
    pub threshold: f64,
    /// Whether to ask the judge for an explanation.
    pub include_reason: bool,
    /// Binary scoring.
    pub strict_mode: bool,
    /// Log intermediate verdicts.
    pub verbose_mode: bool,
    /// Judge used for every verdict.
    pub judge: Arc<dyn Judge>,
}

impl MetricSettings {
    /// Settings with defaults around `judge`.
    pub fn new(judge: Arc<dyn Judge>) -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            include_reason: true,
            strict_mode: false,
            verbose_mode: false,
            judge,
        }
    }

    /// Read the common parameters and resolve the judge.
    pub fn read(reader: &mut ParamReader<'_>, judges: &dyn JudgeProvider) -> EvalResult<Self> {
        let threshold = reader.unit_float("threshold")?;
        let include_reason = reader.bool("include_reason")?;
        let strict_mode = reader.bool("strict_mode")?;
        let verbose_mode = reader.bool("verbose_mode")?;
        let model = reader.string("model")?;

        let judge = judges.judge(model.as_deref())?;
        let mut settings = Self::new(judge);
        if let Some(threshold) = threshold {
            settings.threshold = threshold;
        }
        if let Some(include_reason) = include_reason {
            settings.include_reason = include_reason;
        }
        settings.strict_mode = strict_mode.unwrap_or(false);
        settings.verbose_mode = verbose_mode.unwrap_or(false);
        Ok(settings)
    }

    /// Builder-style threshold override.
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Builder-style reason toggle.
    pub fn with_include_reason(mut self, include_reason: bool) -> Self {
        self.include_reason = include_reason;
        self
    }

    /// Builder-style strict mode toggle.
    pub fn with_strict_mode(mut self, strict_mode: bool) -> Self {
        self.strict_mode = strict_mode;
        self
    }

    /// Threshold after strict mode is applied.
    pub fn effective_threshold(&self, direction: ScoreDirection) -> f64 {
        match (self.strict_mode, direction) {
            (false, _) => self.threshold,
            (true, ScoreDirection::HigherIsBetter) => 1.0,
            (true, ScoreDirection::LowerIsBetter) => 0.0,
        }
    }

    /// Model name reported with results.
    pub fn model_name(&self) -> &str {
        self.judge.model_name()
    }

    /// Cache fingerprint of these settings plus metric-specific `extra`
    /// configuration.
    pub fn fingerprint(&self, extra: serde_json::Value) -> serde_json::Value {
        serde_json::json!({
            "include_reason": self.include_reason,
            "extra": extra,
        })
    }

    /// Turn a raw score into a result.
    ///
    /// In strict mode the score collapses to its best or worst value
    /// according to whether it passed.
    pub fn finalize(
        &self,
        direction: ScoreDirection,
        score: f64,
        reason: Option<String>,
    ) -> MetricResult {
        let threshold = self.effective_threshold(direction);
        let passed = match direction {
            ScoreDirection::HigherIsBetter => score >= threshold,
            ScoreDirection::LowerIsBetter => score <= threshold,
        };
        let score = if self.strict_mode {
            match (passed, direction) {
                (true, ScoreDirection::HigherIsBetter) | (false, ScoreDirection::LowerIsBetter) => {
                    1.0
                }
                (false, ScoreDirection::HigherIsBetter) | (true, ScoreDirection::LowerIsBetter) => {
                    0.0
                }
            }
        } else {
            score
        };
        if self.verbose_mode {
            tracing::debug!(score, threshold, passed, "metric finalized");
        }
        MetricResult {
            score,
            reason: if self.include_reason { reason } else { None },
            success: passed,
        }
    }
}
