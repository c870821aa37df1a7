//! G-Eval: a custom rubric metric scored by the judge on a 0-10 scale.

use crate::case::{LlmTestCase, TestCaseParam};
use crate::error::{EvalError, EvalResult};
use crate::metric::{Metric, MetricResult, MetricSettings, ScoreDirection};
use crate::params::{MetricParams, ParamReader};
use crate::verdict::{judge_list, numbered};
use async_trait::async_trait;
use evalbridge_judge::{generate_json, JudgeProvider};
use serde::Deserialize;
use tokio::sync::OnceCell;

const KIND: &str = "GEval";
const MAX_SCORE: f64 = 10.0;

/// Rubric evaluation defined by `criteria` and/or explicit `evaluation_steps`.
///
/// When only criteria are given, the steps are generated by the judge on the
/// first measurement and reused afterwards.
#[derive(Debug, Clone)]
pub struct GEvalMetric {
    settings: MetricSettings,
    display_name: String,
    criteria: Option<String>,
    evaluation_params: Vec<TestCaseParam>,
    configured_steps: Option<Vec<String>>,
    steps: OnceCell<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct RubricScore {
    score: f64,
    #[serde(default)]
    reason: Option<String>,
}

impl GEvalMetric {
    /// Create a rubric metric from criteria.
    pub fn new(settings: MetricSettings, name: &str, criteria: impl Into<String>) -> Self {
        Self {
            settings,
            display_name: format!("{} [{}]", name, KIND),
            criteria: Some(criteria.into()),
            evaluation_params: vec![TestCaseParam::Input, TestCaseParam::ActualOutput],
            configured_steps: None,
            steps: OnceCell::new(),
        }
    }

    /// Use explicit evaluation steps instead of generating them.
    pub fn with_steps(mut self, steps: Vec<String>) -> Self {
        self.configured_steps = Some(steps.clone());
        self.steps = OnceCell::new_with(Some(steps));
        self
    }

    /// Set the test case fields the rubric looks at.
    pub fn with_evaluation_params(mut self, params: Vec<TestCaseParam>) -> Self {
        self.evaluation_params = params;
        self
    }

    /// Build from named parameters.
    ///
    /// Accepts `name` (required), `criteria`, `evaluation_steps` (one step per
    /// line) and `evaluation_params` (comma separated field names).
    pub fn from_params(params: &MetricParams, judges: &dyn JudgeProvider) -> EvalResult<Self> {
        let mut reader = ParamReader::new(KIND, params);
        let settings = MetricSettings::read(&mut reader, judges)?;
        let name = reader
            .string("name")?
            .ok_or_else(|| EvalError::invalid_param(KIND, "name", "missing required argument"))?;
        let criteria = reader.string("criteria")?.filter(|c| !c.trim().is_empty());
        let steps = reader
            .string("evaluation_steps")?
            .map(|s| split_steps(&s))
            .filter(|s| !s.is_empty());
        let evaluation_params = reader
            .string("evaluation_params")?
            .map(|s| parse_fields(&s))
            .transpose()?;
        reader.finish()?;

        if criteria.is_none() && steps.is_none() {
            return Err(EvalError::invalid_param(
                KIND,
                "criteria",
                "either 'criteria' or 'evaluation_steps' must be provided",
            ));
        }

        let mut metric = Self {
            settings,
            display_name: format!("{} [{}]", name, KIND),
            criteria,
            evaluation_params: vec![TestCaseParam::Input, TestCaseParam::ActualOutput],
            configured_steps: None,
            steps: OnceCell::new(),
        };
        if let Some(steps) = steps {
            metric = metric.with_steps(steps);
        }
        if let Some(fields) = evaluation_params {
            metric = metric.with_evaluation_params(fields);
        }
        Ok(metric)
    }

    async fn steps(&self) -> EvalResult<&Vec<String>> {
        self.steps
            .get_or_try_init(|| async {
                let criteria = self.criteria.as_deref().unwrap_or_default();
                let fields = self.field_names();
                let prompt = format!(
                    r#"Given the evaluation criteria below, write 3-4 concise evaluation
steps for judging a response. The steps may refer to these fields: {fields}.

Return JSON only: {{"steps": ["...", "..."]}}

Criteria:
{criteria}"#
                );
                let steps = judge_list(self.settings.judge.as_ref(), &prompt, "steps").await?;
                if steps.is_empty() {
                    return Err(EvalError::invalid_verdict("judge generated no evaluation steps"));
                }
                Ok::<_, EvalError>(steps)
            })
            .await
    }

    fn field_names(&self) -> String {
        self.evaluation_params
            .iter()
            .map(TestCaseParam::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn split_steps(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_fields(raw: &str) -> EvalResult<Vec<TestCaseParam>> {
    let fields = raw
        .split(',')
        .filter(|s| !s.trim().is_empty())
        .map(|s| {
            TestCaseParam::parse(s).ok_or_else(|| {
                EvalError::invalid_param(
                    KIND,
                    "evaluation_params",
                    format!("unknown test case field '{}'", s.trim()),
                )
            })
        })
        .collect::<EvalResult<Vec<_>>>()?;
    if fields.is_empty() {
        return Err(EvalError::invalid_param(
            KIND,
            "evaluation_params",
            "at least one field is required",
        ));
    }
    Ok(fields)
}

#[async_trait]
impl Metric<LlmTestCase> for GEvalMetric {
    fn name(&self) -> &str {
        &self.display_name
    }

    fn threshold(&self) -> f64 {
        self.settings.effective_threshold(ScoreDirection::HigherIsBetter)
    }

    fn strict_mode(&self) -> bool {
        self.settings.strict_mode
    }

    fn evaluation_model(&self) -> Option<&str> {
        Some(self.settings.model_name())
    }

    fn required_params(&self) -> &[TestCaseParam] {
        &self.evaluation_params
    }

    // Generated steps are left out so the key is the same before and after
    // the first measurement.
    fn cache_fingerprint(&self) -> serde_json::Value {
        self.settings.fingerprint(serde_json::json!({
            "criteria": self.criteria,
            "evaluation_steps": self.configured_steps,
            "evaluation_params": self.evaluation_params,
        }))
    }

    async fn compute(&self, case: &LlmTestCase) -> EvalResult<MetricResult> {
        let steps = self.steps().await?;
        let fields = self
            .evaluation_params
            .iter()
            .map(|p| format!("{}:\n{}", p, case.render_param(*p)))
            .collect::<Vec<_>>()
            .join("\n\n");

        let prompt = format!(
            r#"Evaluate the test case below by following the evaluation steps. Give a
score from 0 to 10, where 10 means the steps are fully satisfied, and a
concise reason that refers to specific details of the test case.

Return JSON only: {{"score": 0, "reason": "..."}}

Evaluation steps:
{}

Test case:
{fields}"#,
            numbered(steps)
        );
        let rubric: RubricScore = generate_json(self.settings.judge.as_ref(), &prompt).await?;
        let score = rubric.score.clamp(0.0, MAX_SCORE) / MAX_SCORE;

        Ok(self
            .settings
            .finalize(ScoreDirection::HigherIsBetter, score, rubric.reason))
    }
}
