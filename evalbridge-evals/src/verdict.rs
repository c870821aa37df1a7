//! Structured judge answers shared by the built-in metrics.

use crate::error::{EvalError, EvalResult};
use evalbridge_judge::{generate_json, Judge};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single yes/no/idk judgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum VerdictValue {
    /// Affirmative.
    Yes,
    /// Negative.
    No,
    /// The judge could not decide.
    Idk,
}

impl VerdictValue {
    /// Lowercase wire form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Yes => "yes",
            Self::No => "no",
            Self::Idk => "idk",
        }
    }
}

impl TryFrom<String> for VerdictValue {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "yes" => Ok(Self::Yes),
            "no" => Ok(Self::No),
            "idk" => Ok(Self::Idk),
            other => Err(format!("unknown verdict '{}'", other)),
        }
    }
}

impl From<VerdictValue> for String {
    fn from(value: VerdictValue) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for VerdictValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A judgement with an optional justification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    /// The judgement.
    pub verdict: VerdictValue,
    /// Why the judge decided this way.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Verdict {
    /// Whether the judgement is `yes`.
    pub fn is_yes(&self) -> bool {
        self.verdict == VerdictValue::Yes
    }

    /// Whether the judgement is `no`.
    pub fn is_no(&self) -> bool {
        self.verdict == VerdictValue::No
    }
}

#[derive(Debug, Deserialize)]
struct Verdicts {
    verdicts: Vec<Verdict>,
}

#[derive(Debug, Deserialize)]
struct Reason {
    reason: String,
}

/// Ask for one verdict per item; the count must match.
pub async fn judge_verdicts(
    judge: &dyn Judge,
    prompt: &str,
    expected_len: usize,
) -> EvalResult<Vec<Verdict>> {
    let parsed: Verdicts = generate_json(judge, prompt).await?;
    if parsed.verdicts.len() != expected_len {
        return Err(EvalError::invalid_verdict(format!(
            "expected {} verdicts, judge returned {}",
            expected_len,
            parsed.verdicts.len()
        )));
    }
    Ok(parsed.verdicts)
}

/// Ask for a single verdict.
pub async fn judge_verdict(judge: &dyn Judge, prompt: &str) -> EvalResult<Verdict> {
    Ok(generate_json(judge, prompt).await?)
}

/// Ask for a list of strings stored under `key`.
pub async fn judge_list(judge: &dyn Judge, prompt: &str, key: &str) -> EvalResult<Vec<String>> {
    let mut object: serde_json::Map<String, serde_json::Value> =
        generate_json(judge, prompt).await?;
    let value = object
        .remove(key)
        .ok_or_else(|| EvalError::invalid_verdict(format!("judge answer has no '{}' key", key)))?;
    let items: Vec<String> = serde_json::from_value(value)?;
    Ok(items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect())
}

/// Ask for a short explanation of a score.
pub async fn judge_reason(judge: &dyn Judge, prompt: &str) -> EvalResult<String> {
    let parsed: Reason = generate_json(judge, prompt).await?;
    Ok(parsed.reason)
}

/// `count / total`, or `empty` when there is nothing to count.
pub fn ratio(count: usize, total: usize, empty: f64) -> f64 {
    if total == 0 {
        empty
    } else {
        count as f64 / total as f64
    }
}

/// Render items as a numbered list for a prompt.
pub fn numbered(items: &[String]) -> String {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| format!("{}. {}", i + 1, item))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Collect the reasons attached to verdicts matching `pred`.
pub fn reasons_where(verdicts: &[Verdict], pred: impl Fn(&Verdict) -> bool) -> Vec<String> {
    verdicts
        .iter()
        .filter(|v| pred(v))
        .filter_map(|v| v.reason.clone())
        .collect()
}
