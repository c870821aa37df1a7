//! Judge and judge-provider traits.

use crate::error::{JudgeError, JudgeResult};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::Arc;

/// A model that answers evaluation prompts.
///
/// Metrics only ever ask for a single completion per prompt and expect the
/// answer to contain a JSON object; see [`generate_json`].
#[async_trait]
pub trait Judge: Send + Sync + fmt::Debug {
    /// Name of the underlying model, reported alongside metric results.
    fn model_name(&self) -> &str;

    /// Produce a completion for the prompt.
    async fn generate(&self, prompt: &str) -> JudgeResult<String>;
}

/// Hands out judges by model name.
///
/// Metrics resolve their judge once, at construction time, from the optional
/// `model` construction parameter.
pub trait JudgeProvider: Send + Sync + fmt::Debug {
    /// Get a judge for `model`, or the provider default when `None`.
    fn judge(&self, model: Option<&str>) -> JudgeResult<Arc<dyn Judge>>;
}

/// Ask the judge and deserialize the first JSON object in its answer.
pub async fn generate_json<T: DeserializeOwned>(judge: &dyn Judge, prompt: &str) -> JudgeResult<T> {
    let raw = judge.generate(prompt).await?;
    parse_json(&raw)
}

/// Deserialize the first JSON object embedded in a completion.
///
/// Completions frequently wrap the object in markdown fences or surround it
/// with prose, so everything outside the outermost braces is discarded.
pub fn parse_json<T: DeserializeOwned>(raw: &str) -> JudgeResult<T> {
    let json = extract_json(raw).ok_or_else(|| {
        JudgeError::invalid_json(format!("no JSON object found in: {}", truncate(raw, 200)))
    })?;
    serde_json::from_str(json).map_err(|e| JudgeError::invalid_json(e.to_string()))
}

fn extract_json(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Statements {
        statements: Vec<String>,
    }

    #[test]
    fn test_parse_plain_json() {
        let parsed: Statements = parse_json(r#"{"statements": ["a", "b"]}"#).unwrap();
        assert_eq!(parsed.statements, vec!["a", "b"]);
    }

    #[test]
    fn test_parse_fenced_json() {
        let raw = "Here you go:\n```json\n{\"statements\": [\"4\"]}\n```";
        let parsed: Statements = parse_json(raw).unwrap();
        assert_eq!(parsed.statements, vec!["4"]);
    }

    #[rstest]
    #[case::prose("I cannot answer that")]
    #[case::wrong_shape(r#"{"verdicts": []}"#)]
    #[case::unterminated(r#"{"statements": ["a""#)]
    fn test_parse_rejects(#[case] raw: &str) {
        let err = parse_json::<Statements>(raw).unwrap_err();
        assert!(matches!(err, JudgeError::InvalidJson(_)));
    }
}
