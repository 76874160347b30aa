//! HTTP route handlers.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::coach::{LlmPlanner, SharedPlanner};
use crate::config::Config;
use crate::llm::{GeminiClient, GeminiClientConfig, LlmClient};
use crate::sanitize::Sanitizer;

use super::types::*;

const DECOMPOSE_FAILED: &str = "Failed to break down task.";
const STUCK_FAILED: &str = "Failed to simplify further.";

type ApiError = (StatusCode, Json<ErrorResponse>);

/// Shared application state.
pub struct AppState {
    /// Planner every request is forwarded to
    pub planner: SharedPlanner,
    /// Model name reported by the health check
    pub model: String,
}

impl AppState {
    pub fn new(planner: SharedPlanner, model: impl Into<String>) -> Self {
        Self {
            planner,
            model: model.into(),
        }
    }

    /// State backed by an [`LlmPlanner`]; health reports that planner's model.
    pub fn with_llm(llm: Arc<dyn LlmClient>, sanitizer: Sanitizer) -> Self {
        let planner = LlmPlanner::new(llm, sanitizer);
        let model = planner.model().to_string();
        Self::new(Arc::new(planner), model)
    }
}

/// Build the router. Exposed separately from [`serve`] for tests.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/decompose", post(decompose))
        .route("/api/stuck", post(stuck))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let mut gemini = GeminiClientConfig::new(config.api_key.clone());
    gemini.model = config.model.clone();
    gemini.endpoint = config.endpoint.clone();
    gemini.timeout = config.llm_timeout;
    let llm = Arc::new(GeminiClient::new(gemini)?);

    let sanitizer = Sanitizer::new(&config.sanitizer_rules());
    let state = Arc::new(AppState::with_llm(llm, sanitizer));

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);
    tracing::info!("Forwarding to model {}", state.model);

    let app = router(state);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Wait for Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

/// Health check endpoint.
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        model: state.model.clone(),
    })
}

/// Break a task into steps.
async fn decompose(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DecomposeRequest>,
) -> Result<Json<DecomposeResponse>, ApiError> {
    let request_id = Uuid::new_v4();
    if req.task.trim().is_empty() {
        return Err(bad_request("task is required"));
    }

    tracing::debug!(%request_id, energy = ?req.prefs.energy_level, "Decompose request");
    match state.planner.decompose(req.task.trim(), &req.prefs).await {
        Ok(steps) => {
            tracing::info!(%request_id, steps = steps.len(), "Decompose complete");
            Ok(Json(DecomposeResponse { steps }))
        }
        Err(e) => {
            tracing::error!(%request_id, "Decompose error: {}", e);
            Err(internal(DECOMPOSE_FAILED))
        }
    }
}

/// Split the current step into micro-actions.
async fn stuck(
    State(state): State<Arc<AppState>>,
    Json(req): Json<StuckRequest>,
) -> Result<Json<ClarificationResult>, ApiError> {
    let request_id = Uuid::new_v4();
    if req.current_step_text.trim().is_empty() {
        return Err(bad_request("currentStepText is required"));
    }

    tracing::debug!(%request_id, "Stuck request");
    match state.planner.clarify(req.current_step_text.trim()).await {
        Ok(result) => Ok(Json(result)),
        Err(e) => {
            tracing::error!(%request_id, "Stuck error: {}", e);
            Err(internal(STUCK_FAILED))
        }
    }
}

fn bad_request(message: &str) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(ErrorResponse::new(message)))
}

fn internal(message: &str) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse::new(message)),
    )
}
