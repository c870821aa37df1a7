//! OpenAI-compatible chat completions judge.

use crate::error::{JudgeError, JudgeResult};
use crate::judge::{Judge, JudgeProvider};
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Default OpenAI API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Model used when neither the request nor the configuration names one.
pub const DEFAULT_MODEL: &str = "gpt-4o";

const SYSTEM_PROMPT: &str =
    "You are a strict evaluation judge. Always answer with a single valid JSON object.";

/// Connection settings shared by every judge a provider hands out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgeConfig {
    /// API key for authentication.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Base URL of the chat completions API.
    pub base_url: String,
    /// Model used when metrics do not ask for one.
    pub default_model: String,
    /// Per-call timeout in seconds.
    pub timeout_seconds: u64,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            default_model: DEFAULT_MODEL.to_string(),
            timeout_seconds: 120,
        }
    }
}

impl JudgeConfig {
    /// Create a config with an API key.
    #[must_use]
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            ..Default::default()
        }
    }

    /// Set the base URL.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the default model.
    #[must_use]
    pub fn default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    /// Set the per-call timeout.
    #[must_use]
    pub fn timeout_seconds(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self
    }
}

/// Judge backed by an OpenAI-compatible `/chat/completions` endpoint.
#[derive(Debug, Clone)]
pub struct OpenAIJudge {
    model_name: String,
    client: Client,
    api_key: String,
    base_url: String,
    timeout: Duration,
}

impl OpenAIJudge {
    /// Create a new judge.
    pub fn new(model_name: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            client: Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(120),
        }
    }

    /// Create from environment variable `OPENAI_API_KEY`.
    pub fn from_env(model_name: impl Into<String>) -> JudgeResult<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| {
            JudgeError::configuration("OPENAI_API_KEY environment variable not set")
        })?;
        Ok(Self::new(model_name, api_key))
    }

    /// Set the base URL.
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set a custom HTTP client.
    #[must_use]
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    /// Set the per-call timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn build_request<'a>(&'a self, prompt: &'a str) -> ChatCompletionRequest<'a> {
        ChatCompletionRequest {
            model: &self.model_name,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: 0.0,
            response_format: ResponseFormat {
                format_type: "json_object",
            },
        }
    }

    fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
        headers
            .get("retry-after")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<u64>().ok())
            .map(Duration::from_secs)
    }

    fn handle_error_response(status: u16, body: &str, headers: &HeaderMap) -> JudgeError {
        if status == 429 {
            return JudgeError::rate_limited(Self::parse_retry_after(headers));
        }

        if let Ok(err) = serde_json::from_str::<OpenAIError>(body) {
            if status == 401 || status == 403 {
                return JudgeError::auth(err.error.message);
            }
            if status >= 500 {
                return JudgeError::http(status, err.error.message);
            }
            return JudgeError::Api {
                message: err.error.message,
                code: err.error.code,
            };
        }

        JudgeError::http(status, body)
    }
}

#[async_trait]
impl Judge for OpenAIJudge {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn generate(&self, prompt: &str) -> JudgeResult<String> {
        let body = self.build_request(prompt);

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    JudgeError::Timeout(self.timeout)
                } else {
                    e.into()
                }
            })?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let headers = response.headers().clone();
            let body = response.text().await.unwrap_or_default();
            return Err(Self::handle_error_response(status, &body, &headers));
        }

        let resp: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| JudgeError::invalid_response(e.to_string()))?;

        if let Some(usage) = &resp.usage {
            tracing::debug!(
                model = %self.model_name,
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "judge call completed"
            );
        }

        resp.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| JudgeError::invalid_response("completion has no content"))
    }
}

/// Provider that builds [`OpenAIJudge`]s from a shared [`JudgeConfig`].
#[derive(Debug, Clone)]
pub struct OpenAIJudgeProvider {
    config: JudgeConfig,
    client: Client,
}

impl OpenAIJudgeProvider {
    /// Create a provider.
    pub fn new(config: JudgeConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }

    /// Access the configuration.
    pub fn config(&self) -> &JudgeConfig {
        &self.config
    }
}

impl JudgeProvider for OpenAIJudgeProvider {
    fn judge(&self, model: Option<&str>) -> Result<Arc<dyn Judge>, JudgeError> {
        let api_key = self.config.api_key.clone().ok_or_else(|| {
            JudgeError::configuration("OPENAI_API_KEY environment variable not set")
        })?;
        let model = model.unwrap_or(&self.config.default_model);

        let judge = OpenAIJudge::new(model, api_key)
            .with_base_url(self.config.base_url.clone())
            .with_client(self.client.clone())
            .with_timeout(Duration::from_secs(self.config.timeout_seconds));
        Ok(Arc::new(judge))
    }
}

// Wire types

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct OpenAIError {
    error: OpenAIErrorBody,
}

#[derive(Debug, Deserialize)]
struct OpenAIErrorBody {
    message: String,
    code: Option<String>,
}
