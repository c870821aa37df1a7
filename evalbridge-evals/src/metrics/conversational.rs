//! Conversational metrics over [`ConversationalTestCase`] turns.

use crate::case::{render_turns, ConversationalTestCase, TestCaseParam};
use crate::error::EvalResult;
use crate::metric::{Metric, MetricResult, MetricSettings, ScoreDirection};
use crate::params::{MetricParams, ParamReader};
use crate::verdict::{
    judge_list, judge_reason, judge_verdict, judge_verdicts, numbered, ratio, reasons_where,
    Verdict,
};
use async_trait::async_trait;
use evalbridge_judge::JudgeProvider;
use futures::future::try_join_all;

const REQUIRED: &[TestCaseParam] = &[TestCaseParam::Input, TestCaseParam::ActualOutput];

/// Default sliding window for [`ConversationRelevancyMetric`].
pub const DEFAULT_WINDOW_SIZE: usize = 3;

fn read_settings(
    name: &str,
    params: &MetricParams,
    judges: &dyn JudgeProvider,
) -> EvalResult<MetricSettings> {
    let mut reader = ParamReader::new(name, params);
    let settings = MetricSettings::read(&mut reader, judges)?;
    reader.finish()?;
    Ok(settings)
}

fn user_messages(case: &ConversationalTestCase) -> String {
    case.turns
        .iter()
        .enumerate()
        .map(|(i, turn)| format!("Turn {}: {}", i + 1, turn.input))
        .collect::<Vec<_>>()
        .join("\n")
}

// ============================================================================
// Knowledge retention
// ============================================================================

const RETENTION_NAME: &str = "Knowledge Retention";

/// Share of turns in which the assistant does not forget facts the user
/// gave earlier in the conversation.
#[derive(Debug, Clone)]
pub struct KnowledgeRetentionMetric {
    settings: MetricSettings,
}

impl KnowledgeRetentionMetric {
    /// Create the metric.
    pub fn new(settings: MetricSettings) -> Self {
        Self { settings }
    }

    /// Build from named parameters.
    pub fn from_params(params: &MetricParams, judges: &dyn JudgeProvider) -> EvalResult<Self> {
        read_settings(RETENTION_NAME, params, judges).map(Self::new)
    }
}

#[async_trait]
impl Metric<ConversationalTestCase> for KnowledgeRetentionMetric {
    judged_metric_accessors!(RETENTION_NAME, ScoreDirection::HigherIsBetter, REQUIRED);

    async fn compute(&self, case: &ConversationalTestCase) -> EvalResult<MetricResult> {
        let judge = self.settings.judge.as_ref();

        let prompt = format!(
            r#"List the facts the user reveals about themselves or their situation in
the messages below.

Return JSON only: {{"facts": ["...", "..."]}}

User messages:
{}"#,
            user_messages(case)
        );
        let facts = judge_list(judge, &prompt, "facts").await?;

        let verdicts = if facts.is_empty() {
            Vec::new()
        } else {
            let prompt = format!(
                r#"For each turn of the conversation, decide whether the assistant's
response shows it forgot something the user said in an earlier turn, for
example by asking for it again or contradicting it. Answer "yes" if it forgot
and "no" otherwise, with a reason for every "yes".

Return JSON only, one verdict per turn in order:
{{"verdicts": [{{"verdict": "yes|no", "reason": "..."}}]}}

Known facts:
{}

Conversation:
{}"#,
                numbered(&facts),
                case.transcript()
            );
            judge_verdicts(judge, &prompt, case.turns.len()).await?
        };

        let retained = case.turns.len() - verdicts.iter().filter(|v| v.is_yes()).count();
        let score = ratio(retained, case.turns.len(), 1.0);

        let reason = if self.settings.include_reason {
            let lapses = reasons_where(&verdicts, Verdict::is_yes);
            let prompt = format!(
                r#"The knowledge retention score is {score:.2} (1 means nothing was
forgotten). Explain it concisely.

Return JSON only: {{"reason": "..."}}

Lapses:
{}"#,
                numbered(&lapses)
            );
            Some(judge_reason(judge, &prompt).await?)
        } else {
            None
        };

        Ok(self
            .settings
            .finalize(ScoreDirection::HigherIsBetter, score, reason))
    }
}

// ============================================================================
// Conversation completeness
// ============================================================================

const COMPLETENESS_NAME: &str = "Conversation Completeness";

/// Share of user intentions the assistant satisfied over the conversation.
#[derive(Debug, Clone)]
pub struct ConversationCompletenessMetric {
    settings: MetricSettings,
}

impl ConversationCompletenessMetric {
    /// Create the metric.
    pub fn new(settings: MetricSettings) -> Self {
        Self { settings }
    }

    /// Build from named parameters.
    pub fn from_params(params: &MetricParams, judges: &dyn JudgeProvider) -> EvalResult<Self> {
        read_settings(COMPLETENESS_NAME, params, judges).map(Self::new)
    }
}

#[async_trait]
impl Metric<ConversationalTestCase> for ConversationCompletenessMetric {
    judged_metric_accessors!(COMPLETENESS_NAME, ScoreDirection::HigherIsBetter, REQUIRED);

    async fn compute(&self, case: &ConversationalTestCase) -> EvalResult<MetricResult> {
        let judge = self.settings.judge.as_ref();

        let prompt = format!(
            r#"List the high-level intentions the user expresses in the messages
below. Each intention should be a short phrase such as "book a flight".

Return JSON only: {{"intentions": ["...", "..."]}}

User messages:
{}"#,
            user_messages(case)
        );
        let intentions = judge_list(judge, &prompt, "intentions").await?;

        let verdicts = if intentions.is_empty() {
            Vec::new()
        } else {
            let prompt = format!(
                r#"For each user intention, decide whether the assistant satisfied it at
any point in the conversation. Answer "yes" or "no", with a reason for every
"no".

Return JSON only, one verdict per intention in order:
{{"verdicts": [{{"verdict": "yes|no", "reason": "..."}}]}}

Intentions:
{}

Conversation:
{}"#,
                numbered(&intentions),
                case.transcript()
            );
            judge_verdicts(judge, &prompt, intentions.len()).await?
        };

        let satisfied = verdicts.iter().filter(|v| v.is_yes()).count();
        let score = ratio(satisfied, verdicts.len(), 1.0);

        let reason = if self.settings.include_reason {
            let unmet = reasons_where(&verdicts, Verdict::is_no);
            let prompt = format!(
                r#"The conversation completeness score is {score:.2}. Explain it
concisely.

Return JSON only: {{"reason": "..."}}

Unsatisfied intentions:
{}"#,
                numbered(&unmet)
            );
            Some(judge_reason(judge, &prompt).await?)
        } else {
            None
        };

        Ok(self
            .settings
            .finalize(ScoreDirection::HigherIsBetter, score, reason))
    }
}

// ============================================================================
// Conversation relevancy
// ============================================================================

const RELEVANCY_NAME: &str = "Conversation Relevancy";

/// Share of assistant responses relevant to the recent conversation.
///
/// Each turn is judged against a sliding window of the `window_size` turns
/// ending at it. Turns are judged concurrently.
#[derive(Debug, Clone)]
pub struct ConversationRelevancyMetric {
    settings: MetricSettings,
    window_size: usize,
}

impl ConversationRelevancyMetric {
    /// Create the metric.
    pub fn new(settings: MetricSettings) -> Self {
        Self {
            settings,
            window_size: DEFAULT_WINDOW_SIZE,
        }
    }

    /// Set the sliding window size.
    pub fn with_window_size(mut self, window_size: usize) -> Self {
        self.window_size = window_size.max(1);
        self
    }

    fn fingerprint_extra(&self) -> serde_json::Value {
        serde_json::json!({ "window_size": self.window_size })
    }

    /// Build from named parameters; accepts `window_size`.
    pub fn from_params(params: &MetricParams, judges: &dyn JudgeProvider) -> EvalResult<Self> {
        let mut reader = ParamReader::new(RELEVANCY_NAME, params);
        let settings = MetricSettings::read(&mut reader, judges)?;
        let window_size = reader.positive_int("window_size")?;
        reader.finish()?;
        Ok(Self::new(settings).with_window_size(window_size.unwrap_or(DEFAULT_WINDOW_SIZE)))
    }
}

#[async_trait]
impl Metric<ConversationalTestCase> for ConversationRelevancyMetric {
    judged_metric_accessors!(
        RELEVANCY_NAME,
        ScoreDirection::HigherIsBetter,
        REQUIRED,
        fingerprint = fingerprint_extra
    );

    async fn compute(&self, case: &ConversationalTestCase) -> EvalResult<MetricResult> {
        let judge = self.settings.judge.as_ref();

        let prompts: Vec<String> = (0..case.turns.len())
            .map(|i| {
                let start = (i + 1).saturating_sub(self.window_size);
                format!(
                    r#"Decide whether the assistant's response in the last turn is relevant
given the conversation so far. Answer "yes" or "no", with a reason if "no".

Return JSON only: {{"verdict": "yes|no", "reason": "..."}}

Conversation:
{}"#,
                    render_turns(&case.turns[start..=i])
                )
            })
            .collect();
        let verdicts =
            try_join_all(prompts.iter().map(|prompt| judge_verdict(judge, prompt))).await?;

        let relevant = verdicts.iter().filter(|v| !v.is_no()).count();
        let score = ratio(relevant, verdicts.len(), 1.0);

        let reason = if self.settings.include_reason {
            let irrelevant = reasons_where(&verdicts, Verdict::is_no);
            let prompt = format!(
                r#"The conversation relevancy score is {score:.2}. Explain it concisely.

Return JSON only: {{"reason": "..."}}

Irrelevant responses:
{}"#,
                numbered(&irrelevant)
            );
            Some(judge_reason(judge, &prompt).await?)
        } else {
            None
        };

        Ok(self
            .settings
            .finalize(ScoreDirection::HigherIsBetter, score, reason))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::case::LlmTestCase;
    use crate::metrics::testing::{fn_settings, mock_settings};
    use crate::params::ParamValue;
    use evalbridge_judge::{JudgeError, MockJudge, StaticJudgeProvider};

    fn conversation() -> ConversationalTestCase {
        ConversationalTestCase::new(vec![
            LlmTestCase::new("My name is Ana and I need a flight to Lisbon.", "Sure, Ana."),
            LlmTestCase::new("Make it next Friday.", "What is your name?"),
            LlmTestCase::new("Also, what's the weather there?", "I like turtles."),
        ])
    }

    #[tokio::test]
    async fn test_knowledge_retention() {
        let judge = MockJudge::new("mock")
            .with_response(r#"{"facts": ["Name is Ana", "Flying to Lisbon"]}"#)
            .with_response(
                r#"{"verdicts": [{"verdict": "no"}, {"verdict": "yes", "reason": "asked for the name again"}, {"verdict": "no"}]}"#,
            )
            .with_response(r#"{"reason": "The assistant forgot the user's name."}"#);
        let metric = KnowledgeRetentionMetric::new(mock_settings(&judge));

        let result = metric.measure(&conversation()).await.unwrap();
        assert!((result.score - 2.0 / 3.0).abs() < 1e-9);
        assert!(judge.recorded_prompts()[1].contains("Turn 3:"));
        assert!(judge.recorded_prompts()[2].contains("asked for the name again"));
    }

    #[tokio::test]
    async fn test_knowledge_retention_without_facts() {
        let judge = MockJudge::new("mock").with_response(r#"{"facts": []}"#);
        let metric = KnowledgeRetentionMetric::new(mock_settings(&judge).with_include_reason(false));

        let result = metric.measure(&conversation()).await.unwrap();
        assert_eq!(result.score, 1.0);
        assert_eq!(judge.call_count(), 1);
    }

    #[tokio::test]
    async fn test_conversation_completeness() {
        let judge = MockJudge::new("mock")
            .with_response(r#"{"intentions": ["book a flight", "learn the weather"]}"#)
            .with_response(
                r#"{"verdicts": [{"verdict": "yes"}, {"verdict": "no", "reason": "weather never answered"}]}"#,
            );
        let metric =
            ConversationCompletenessMetric::new(mock_settings(&judge).with_include_reason(false));

        let result = metric.measure(&conversation()).await.unwrap();
        assert_eq!(result.score, 0.5);
        assert!(result.success);
    }

    #[tokio::test]
    async fn test_conversation_relevancy_windows() {
        let metric = ConversationRelevancyMetric::new(
            fn_settings(|prompt| {
                let answer = if prompt.contains("Return JSON only: {\"reason\"") {
                    r#"{"reason": "One reply was off topic."}"#
                } else if prompt.contains("Assistant: I like turtles.") {
                    r#"{"verdict": "no", "reason": "turtles"}"#
                } else {
                    r#"{"verdict": "yes"}"#
                };
                Ok(answer.to_string())
            }),
        )
        .with_window_size(2);

        let result = metric.measure(&conversation()).await.unwrap();
        assert!((result.score - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(result.reason.as_deref(), Some("One reply was off topic."));
    }

    #[tokio::test]
    async fn test_conversation_relevancy_window_excludes_old_turns() {
        let settings = fn_settings(|prompt| {
            if prompt.contains("Lisbon") && prompt.contains("weather") {
                Err(JudgeError::invalid_response("window too wide"))
            } else {
                Ok(r#"{"verdict": "yes"}"#.to_string())
            }
        });
        let metric = ConversationRelevancyMetric::new(settings.with_include_reason(false))
            .with_window_size(2);

        let result = metric.measure(&conversation()).await.unwrap();
        assert_eq!(result.score, 1.0);
    }

    #[tokio::test]
    async fn test_empty_conversation_is_missing_params() {
        let judge = MockJudge::new("mock");
        let metric = ConversationCompletenessMetric::new(mock_settings(&judge));

        let err = metric
            .measure(&ConversationalTestCase::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "missing_params");
    }

    #[test]
    fn test_window_size_param() {
        let provider = StaticJudgeProvider::new(MockJudge::new("mock"));
        let mut params = MetricParams::new();
        params.insert("window_size".into(), ParamValue::Int(5));
        let metric = ConversationRelevancyMetric::from_params(&params, &provider).unwrap();
        assert_eq!(metric.window_size, 5);
        assert_eq!(metric.name(), "Conversation Relevancy");
    }

    #[test]
    fn test_window_size_in_fingerprint() {
        let judge = MockJudge::new("mock");
        let narrow = ConversationRelevancyMetric::new(mock_settings(&judge)).with_window_size(2);
        let wide = ConversationRelevancyMetric::new(mock_settings(&judge)).with_window_size(5);
        assert_ne!(narrow.cache_fingerprint(), wide.cache_fingerprint());

        let quiet = KnowledgeRetentionMetric::new(
            mock_settings(&judge).with_include_reason(false),
        );
        let chatty = KnowledgeRetentionMetric::new(mock_settings(&judge));
        assert_ne!(quiet.cache_fingerprint(), chatty.cache_fingerprint());
    }
}
