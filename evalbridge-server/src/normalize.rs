//! Conversion from wire records into engine test cases.
//!
//! Absent optional sequences become empty vectors. An absent
//! `expected_output` stays `None` so metrics can tell "no reference" apart
//! from an empty one.

use crate::schema::{ConversationRequest, EvaluationUnitRequest};
use evalbridge_evals::{ConversationalTestCase, LlmTestCase};

/// Normalize one single-turn record.
pub fn normalize_unit(unit: EvaluationUnitRequest) -> LlmTestCase {
    LlmTestCase {
        input: unit.input,
        actual_output: unit.actual_output,
        expected_output: unit.expected_output,
        context: unit.context.unwrap_or_default(),
        retrieval_context: unit.retrieval_context.unwrap_or_default(),
        tools_called: unit.tools_called.unwrap_or_default(),
        expected_tools: unit.expected_tools.unwrap_or_default(),
    }
}

/// Normalize a conversation, keeping turn order.
pub fn normalize_conversation(conversation: ConversationRequest) -> ConversationalTestCase {
    ConversationalTestCase::new(conversation.turns.into_iter().map(normalize_unit).collect())
}

impl From<EvaluationUnitRequest> for LlmTestCase {
    fn from(unit: EvaluationUnitRequest) -> Self {
        normalize_unit(unit)
    }
}

impl From<ConversationRequest> for ConversationalTestCase {
    fn from(conversation: ConversationRequest) -> Self {
        normalize_conversation(conversation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn unit(input: &str, output: &str) -> EvaluationUnitRequest {
        EvaluationUnitRequest {
            input: input.into(),
            actual_output: output.into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_absent_sequences_become_empty() {
        let case = normalize_unit(unit("q", "a"));
        assert_eq!(case, LlmTestCase::new("q", "a"));
        assert!(case.context.is_empty());
        assert!(case.retrieval_context.is_empty());
        assert!(case.tools_called.is_empty());
        assert!(case.expected_tools.is_empty());
        assert!(case.expected_output.is_none());
    }

    #[test]
    fn test_present_fields_are_kept() {
        let case = normalize_unit(EvaluationUnitRequest {
            expected_output: Some(String::new()),
            context: Some(vec!["c1".into(), "c2".into()]),
            tools_called: Some(vec!["search".into()]),
            ..unit("q", "a")
        });
        assert_eq!(case.expected_output.as_deref(), Some(""));
        assert_eq!(case.context, vec!["c1", "c2"]);
        assert_eq!(case.tools_called, vec!["search"]);
    }

    #[test]
    fn test_conversation_preserves_order() {
        let convo: ConversationalTestCase = ConversationRequest {
            turns: vec![unit("first", "1"), unit("second", "2"), unit("third", "3")],
        }
        .into();
        let inputs: Vec<&str> = convo.turns.iter().map(|t| t.input.as_str()).collect();
        assert_eq!(inputs, vec!["first", "second", "third"]);
    }
}
