//! Mock and function-based judges for testing.
//!
//! - [`MockJudge`]: returns queued completions in order and records prompts
//! - [`FunctionJudge`]: answers through a closure that sees the prompt
//! - [`StaticJudgeProvider`]: hands the same judge out for every model name
//!
//! ```rust
//! use evalbridge_judge::MockJudge;
//!
//! let judge = MockJudge::new("mock")
//!     .with_response(r#"{"statements": ["4"]}"#)
//!     .with_response(r#"{"verdicts": [{"verdict": "yes"}]}"#);
//! ```

use crate::error::{JudgeError, JudgeResult};
use crate::judge::{Judge, JudgeProvider};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

// ============================================================================
// MockJudge
// ============================================================================

/// A judge that replays pre-configured completions.
#[derive(Debug, Clone)]
pub struct MockJudge {
    name: String,
    responses: Arc<Mutex<VecDeque<JudgeResult<String>>>>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl MockJudge {
    /// Create a new mock judge.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            responses: Arc::new(Mutex::new(VecDeque::new())),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Queue a completion.
    pub fn with_response(self, response: impl Into<String>) -> Self {
        self.responses.lock().push_back(Ok(response.into()));
        self
    }

    /// Queue a failure.
    pub fn with_error(self, error: JudgeError) -> Self {
        self.responses.lock().push_back(Err(error));
        self
    }

    /// Prompts received so far.
    pub fn recorded_prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }

    /// Number of calls made so far.
    pub fn call_count(&self) -> usize {
        self.prompts.lock().len()
    }
}

#[async_trait]
impl Judge for MockJudge {
    fn model_name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, prompt: &str) -> JudgeResult<String> {
        self.prompts.lock().push(prompt.to_string());
        self.responses.lock().pop_front().unwrap_or_else(|| {
            Err(JudgeError::invalid_response(
                "MockJudge has no queued responses left",
            ))
        })
    }
}

// ============================================================================
// FunctionJudge
// ============================================================================

/// Callback type used by [`FunctionJudge`].
pub type JudgeFn = dyn Fn(&str) -> JudgeResult<String> + Send + Sync;

/// A judge controlled by a local function.
///
/// Useful when calls happen concurrently and queue order is not stable.
#[derive(Clone)]
pub struct FunctionJudge {
    name: String,
    function: Arc<JudgeFn>,
    calls: Arc<Mutex<usize>>,
}

impl fmt::Debug for FunctionJudge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionJudge")
            .field("name", &self.name)
            .field("calls", &*self.calls.lock())
            .finish()
    }
}

impl FunctionJudge {
    /// Create a judge whose completions come from `function`.
    pub fn new<F>(name: impl Into<String>, function: F) -> Self
    where
        F: Fn(&str) -> JudgeResult<String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            function: Arc::new(function),
            calls: Arc::new(Mutex::new(0)),
        }
    }

    /// Number of calls made so far.
    pub fn call_count(&self) -> usize {
        *self.calls.lock()
    }
}

#[async_trait]
impl Judge for FunctionJudge {
    fn model_name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, prompt: &str) -> JudgeResult<String> {
        *self.calls.lock() += 1;
        (self.function)(prompt)
    }
}

// ============================================================================
// StaticJudgeProvider
// ============================================================================

/// Provider returning the same judge regardless of the requested model.
#[derive(Debug, Clone)]
pub struct StaticJudgeProvider {
    judge: Arc<dyn Judge>,
}

impl StaticJudgeProvider {
    /// Wrap a judge.
    pub fn new(judge: impl Judge + 'static) -> Self {
        Self {
            judge: Arc::new(judge),
        }
    }

    /// Wrap an already shared judge.
    pub fn from_arc(judge: Arc<dyn Judge>) -> Self {
        Self { judge }
    }
}

impl JudgeProvider for StaticJudgeProvider {
    fn judge(&self, _model: Option<&str>) -> JudgeResult<Arc<dyn Judge>> {
        Ok(self.judge.clone())
    }
}
