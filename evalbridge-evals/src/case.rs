//! Test case definitions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single-turn LLM interaction to be scored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LlmTestCase {
    /// Prompt presented to the system under test.
    pub input: String,
    /// Response produced by the system under test.
    pub actual_output: String,
    /// Reference answer, if one exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_output: Option<String>,
    /// Ground-truth background passages.
    #[serde(default)]
    pub context: Vec<String>,
    /// Passages retrieved at answer time.
    #[serde(default)]
    pub retrieval_context: Vec<String>,
    /// Tools the system actually called.
    #[serde(default)]
    pub tools_called: Vec<String>,
    /// Tools the system was expected to call.
    #[serde(default)]
    pub expected_tools: Vec<String>,
}

impl LlmTestCase {
    /// Create a test case from an input/output pair.
    pub fn new(input: impl Into<String>, actual_output: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            actual_output: actual_output.into(),
            ..Default::default()
        }
    }

    /// Set the expected output.
    pub fn with_expected_output(mut self, expected: impl Into<String>) -> Self {
        self.expected_output = Some(expected.into());
        self
    }

    /// Set the ground-truth context.
    pub fn with_context(mut self, context: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.context = context.into_iter().map(Into::into).collect();
        self
    }

    /// Set the retrieval context.
    pub fn with_retrieval_context(
        mut self,
        context: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.retrieval_context = context.into_iter().map(Into::into).collect();
        self
    }

    /// Set the tools called.
    pub fn with_tools_called(mut self, tools: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.tools_called = tools.into_iter().map(Into::into).collect();
        self
    }

    /// Set the expected tools.
    pub fn with_expected_tools(mut self, tools: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.expected_tools = tools.into_iter().map(Into::into).collect();
        self
    }

    /// Whether a parameter carries a usable value.
    ///
    /// Strings must be non-blank and sequences non-empty.
    pub fn has_param(&self, param: TestCaseParam) -> bool {
        match param {
            TestCaseParam::Input => !self.input.trim().is_empty(),
            TestCaseParam::ActualOutput => !self.actual_output.trim().is_empty(),
            TestCaseParam::ExpectedOutput => self
                .expected_output
                .as_deref()
                .is_some_and(|s| !s.trim().is_empty()),
            TestCaseParam::Context => !self.context.is_empty(),
            TestCaseParam::RetrievalContext => !self.retrieval_context.is_empty(),
            TestCaseParam::ToolsCalled => !self.tools_called.is_empty(),
            TestCaseParam::ExpectedTools => !self.expected_tools.is_empty(),
        }
    }

    /// Render a parameter for inclusion in a judge prompt.
    pub fn render_param(&self, param: TestCaseParam) -> String {
        match param {
            TestCaseParam::Input => self.input.clone(),
            TestCaseParam::ActualOutput => self.actual_output.clone(),
            TestCaseParam::ExpectedOutput => self.expected_output.clone().unwrap_or_default(),
            TestCaseParam::Context => self.context.join("\n"),
            TestCaseParam::RetrievalContext => self.retrieval_context.join("\n"),
            TestCaseParam::ToolsCalled => self.tools_called.join(", "),
            TestCaseParam::ExpectedTools => self.expected_tools.join(", "),
        }
    }
}

/// A multi-turn conversation; turn order is significant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationalTestCase {
    /// Turns in the order they happened.
    pub turns: Vec<LlmTestCase>,
}

impl ConversationalTestCase {
    /// Create a conversation from its turns.
    pub fn new(turns: Vec<LlmTestCase>) -> Self {
        Self { turns }
    }

    /// Render the conversation as a numbered transcript.
    pub fn transcript(&self) -> String {
        render_turns(&self.turns)
    }
}

/// Render turns as a numbered user/assistant transcript.
pub fn render_turns(turns: &[LlmTestCase]) -> String {
    turns
        .iter()
        .enumerate()
        .map(|(i, turn)| {
            format!(
                "Turn {}:\nUser: {}\nAssistant: {}",
                i + 1,
                turn.input,
                turn.actual_output
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Test case fields a metric can depend on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestCaseParam {
    /// `input`
    Input,
    /// `actual_output`
    ActualOutput,
    /// `expected_output`
    ExpectedOutput,
    /// `context`
    Context,
    /// `retrieval_context`
    RetrievalContext,
    /// `tools_called`
    ToolsCalled,
    /// `expected_tools`
    ExpectedTools,
}

impl TestCaseParam {
    /// Every parameter, in declaration order.
    pub const ALL: [TestCaseParam; 7] = [
        TestCaseParam::Input,
        TestCaseParam::ActualOutput,
        TestCaseParam::ExpectedOutput,
        TestCaseParam::Context,
        TestCaseParam::RetrievalContext,
        TestCaseParam::ToolsCalled,
        TestCaseParam::ExpectedTools,
    ];

    /// Field name as it appears on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::ActualOutput => "actual_output",
            Self::ExpectedOutput => "expected_output",
            Self::Context => "context",
            Self::RetrievalContext => "retrieval_context",
            Self::ToolsCalled => "tools_called",
            Self::ExpectedTools => "expected_tools",
        }
    }

    /// Parse a field name.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.as_str() == name.trim())
    }
}

impl fmt::Display for TestCaseParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shape-independent view of something a metric can score.
pub trait TestCase: Serialize + Send + Sync {
    /// Required parameters that this test case does not provide.
    fn missing_params(&self, required: &[TestCaseParam]) -> Vec<TestCaseParam>;
}

impl TestCase for LlmTestCase {
    fn missing_params(&self, required: &[TestCaseParam]) -> Vec<TestCaseParam> {
        required
            .iter()
            .copied()
            .filter(|p| !self.has_param(*p))
            .collect()
    }
}

impl TestCase for ConversationalTestCase {
    /// A parameter is missing if any turn lacks it.
    fn missing_params(&self, required: &[TestCaseParam]) -> Vec<TestCaseParam> {
        required
            .iter()
            .copied()
            .filter(|p| self.turns.is_empty() || self.turns.iter().any(|t| !t.has_param(*p)))
            .collect()
    }
}
