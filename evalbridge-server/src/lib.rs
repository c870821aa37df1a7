//! # evalbridge-server
//!
//! JSON-over-HTTP adapter for the evalbridge metric engine.
//!
//! A request names a metric and carries one or more test cases. The server
//! normalizes the cases, builds the metric from the registry and returns
//! the score, reason and pass/fail verdict.
//!
//! ## Endpoints
//!
//! | Method | Path | Body |
//! |--------|------|------|
//! | POST | `/evaluate` | [`EvaluateRequest`] |
//! | POST | `/evaluate-conversation` | [`EvaluateConversationRequest`] |
//! | POST | `/evaluate-bulk` | [`BulkEvaluateRequest`] |
//! | POST | `/evaluate-bulk-conversation` | [`BulkEvaluateConversationRequest`] |
//! | GET | `/health` | |
//! | GET | `/metrics` | |
//!
//! ## Example
//!
//! ```ignore
//! use evalbridge_server::{serve, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     serve(ServerConfig::from_env()?).await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod bulk;
pub mod config;
pub mod error;
pub mod invoker;
pub mod normalize;
pub mod registry;
pub mod routes;
pub mod schema;
pub mod telemetry;

pub use bulk::BulkOrchestrator;
pub use config::{ConfigError, LogFormat, ServerConfig};
pub use error::{ErrorResponse, ServerError, ServiceError, ServiceResult, METRIC_NOT_SUPPORTED};
pub use invoker::MetricInvoker;
pub use normalize::{normalize_conversation, normalize_unit};
pub use registry::{
    constructor, MetricConstructor, MetricRegistry, MetricRegistryBuilder, MetricShape,
    MetricTable,
};
pub use routes::{app_router, AppState, ValidatedJson};
pub use schema::{
    BulkEvaluateConversationRequest, BulkEvaluateRequest, BulkEvaluateResponse,
    ConversationRequest, EvaluateConversationRequest, EvaluateRequest, EvaluateResponse,
    EvaluationUnitRequest, HealthResponse, MetricsResponse, TestCaseResult, Validate,
};
pub use telemetry::init_tracing;

use evalbridge_judge::OpenAIJudgeProvider;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Crate version reported by `/health`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Bind `config.addr` and serve until the process is stopped.
pub async fn serve(config: ServerConfig) -> Result<(), ServerError> {
    if config.judge.api_key.is_none() {
        tracing::warn!("OPENAI_API_KEY is not set; evaluation requests will fail until it is");
    }
    let judges = Arc::new(OpenAIJudgeProvider::new(config.judge.clone()));
    let router = app_router(AppState::new(judges));

    let listener = TcpListener::bind(config.addr)
        .await
        .map_err(|e| ServerError::Bind(e.to_string()))?;
    tracing::info!(
        addr = %config.addr,
        model = %config.judge.default_model,
        version = VERSION,
        "evalbridge server listening"
    );

    axum::serve(listener, router)
        .await
        .map_err(|e| ServerError::Serve(e.to_string()))?;

    Ok(())
}
