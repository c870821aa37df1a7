//! # evalbridge-judge
//!
//! LLM-as-judge backends for evalbridge metrics.
//!
//! Metrics never talk to a model API directly. They hold an
//! `Arc<dyn Judge>` obtained from a [`JudgeProvider`], which lets the
//! service swap the OpenAI-compatible backend for a mock in tests.
//!
//! ## Backends
//!
//! - **[`OpenAIJudge`]**: any OpenAI-compatible `/chat/completions` endpoint
//! - **[`MockJudge`]** / **[`FunctionJudge`]**: deterministic test judges
//!
//! ## Example
//!
//! ```ignore
//! use evalbridge_judge::{generate_json, JudgeConfig, JudgeProvider, OpenAIJudgeProvider};
//!
//! let provider = OpenAIJudgeProvider::new(JudgeConfig::with_api_key("sk-..."));
//! let judge = provider.judge(Some("gpt-4o-mini"))?;
//! let verdict: serde_json::Value = generate_json(judge.as_ref(), "Answer in JSON").await?;
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod error;
pub mod judge;
pub mod mock;
pub mod openai;

pub use error::{JudgeError, JudgeResult};
pub use judge::{generate_json, parse_json, Judge, JudgeProvider};
pub use mock::{FunctionJudge, JudgeFn, MockJudge, StaticJudgeProvider};
pub use openai::{JudgeConfig, OpenAIJudge, OpenAIJudgeProvider, DEFAULT_BASE_URL, DEFAULT_MODEL};
