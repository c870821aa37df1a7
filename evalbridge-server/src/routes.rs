//! Axum route handlers.
//!
//! # Routes
//!
//! - `POST /evaluate`                    single-turn case, one metric
//! - `POST /evaluate-conversation`       conversation, one metric
//! - `POST /evaluate-bulk`               many single-turn cases, many metrics
//! - `POST /evaluate-bulk-conversation`  many conversations, many metrics
//! - `GET  /health`                      liveness probe
//! - `GET  /metrics`                     registered metric names

use crate::bulk::BulkOrchestrator;
use crate::error::{ServiceError, ServiceResult};
use crate::invoker::MetricInvoker;
use crate::normalize::{normalize_conversation, normalize_unit};
use crate::registry::MetricRegistry;
use crate::schema::{
    BulkEvaluateConversationRequest, BulkEvaluateRequest, BulkEvaluateResponse,
    EvaluateConversationRequest, EvaluateRequest, EvaluateResponse, HealthResponse,
    MetricsResponse, Validate,
};
use axum::{
    extract::{rejection::JsonRejection, FromRequest, Request, State},
    routing::{get, post},
    Json, Router,
};
use evalbridge_evals::{ConversationalTestCase, LlmTestCase};
use evalbridge_judge::JudgeProvider;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared application state.
///
/// Everything here is immutable after start-up. Per-request scratch state,
/// such as the bulk result cache, lives inside the handler that needs it.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Metric constructors, read-only after start-up.
    pub registry: Arc<MetricRegistry>,
    /// Source of judges handed to metric constructors.
    pub judges: Arc<dyn JudgeProvider>,
}

impl AppState {
    /// State around the standard registry.
    pub fn new(judges: Arc<dyn JudgeProvider>) -> Self {
        Self::with_registry(MetricRegistry::standard(), judges)
    }

    /// State around a custom registry.
    pub fn with_registry(registry: MetricRegistry, judges: Arc<dyn JudgeProvider>) -> Self {
        Self {
            registry: Arc::new(registry),
            judges,
        }
    }

    fn invoker(&self) -> MetricInvoker<'_> {
        MetricInvoker::new(&self.registry, self.judges.as_ref())
    }

    fn orchestrator(&self) -> BulkOrchestrator<'_> {
        BulkOrchestrator::new(&self.registry, self.judges.as_ref())
    }
}

/// Build the axum router with all routes.
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/evaluate", post(evaluate_handler))
        .route("/evaluate-conversation", post(evaluate_conversation_handler))
        .route("/evaluate-bulk", post(evaluate_bulk_handler))
        .route(
            "/evaluate-bulk-conversation",
            post(evaluate_bulk_conversation_handler),
        )
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// JSON body that also passed [`Validate`].
///
/// Every rejection becomes a 422 with the uniform error body.
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection: JsonRejection| ServiceError::invalid_request(rejection.body_text()))?;
        value.validate()?;
        Ok(Self(value))
    }
}

/// POST /evaluate
async fn evaluate_handler(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<EvaluateRequest>,
) -> ServiceResult<Json<EvaluateResponse>> {
    info!(
        metric = request.metric_name.as_deref().unwrap_or(""),
        shape = "single_turn",
        "evaluate"
    );
    let unit: LlmTestCase = normalize_unit(request.test_case);
    let result = state
        .invoker()
        .invoke(
            &unit,
            request.metric_name.as_deref(),
            request.metric_params.as_ref(),
        )
        .await?;
    Ok(Json(result.into()))
}

/// POST /evaluate-conversation
async fn evaluate_conversation_handler(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<EvaluateConversationRequest>,
) -> ServiceResult<Json<EvaluateResponse>> {
    info!(
        metric = request.metric_name.as_deref().unwrap_or(""),
        shape = "conversational",
        turns = request.test_case.turns.len(),
        "evaluate conversation"
    );
    let unit: ConversationalTestCase = normalize_conversation(request.test_case);
    let result = state
        .invoker()
        .invoke(
            &unit,
            request.metric_name.as_deref(),
            request.metric_params.as_ref(),
        )
        .await?;
    Ok(Json(result.into()))
}

/// POST /evaluate-bulk
async fn evaluate_bulk_handler(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<BulkEvaluateRequest>,
) -> ServiceResult<Json<BulkEvaluateResponse>> {
    let units: Vec<LlmTestCase> = request.test_cases.into_iter().map(normalize_unit).collect();
    let test_case_results = state
        .orchestrator()
        .run_bulk(&units, &request.metric_names, &request.config)
        .await?;
    Ok(Json(BulkEvaluateResponse { test_case_results }))
}

/// POST /evaluate-bulk-conversation
async fn evaluate_bulk_conversation_handler(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<BulkEvaluateConversationRequest>,
) -> ServiceResult<Json<BulkEvaluateResponse>> {
    let units: Vec<ConversationalTestCase> = request
        .test_cases
        .into_iter()
        .map(normalize_conversation)
        .collect();
    let test_case_results = state
        .orchestrator()
        .run_bulk(&units, &request.metric_names, &request.config)
        .await?;
    Ok(Json(BulkEvaluateResponse { test_case_results }))
}

/// GET /health
async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "evalbridge".to_string(),
        version: crate::VERSION.to_string(),
    })
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> Json<MetricsResponse> {
    Json(MetricsResponse {
        single_turn: state.registry.single_turn_names(),
        conversational: state.registry.conversational_names(),
    })
}
