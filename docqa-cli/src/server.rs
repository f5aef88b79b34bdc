//! HTTP answer endpoint: `GET /health`, `GET /api/status` and
//! `POST /api/answer`.
//!
//! Failed questions still return an [`AnswerResponse`] body, with the HTTP
//! status chosen from the error kind.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use docqa_rag::{AnswerResponse, IndexStatus, RagError, RagPipeline};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<RagPipeline>,
}

impl AppState {
    pub fn new(pipeline: RagPipeline) -> Self {
        Self { pipeline: Arc::new(pipeline) }
    }
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "127.0.0.1".to_string(), port: 8000 }
    }
}

/// Body of `POST /api/answer`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerRequest {
    pub question: String,
}

pub fn app_router(state: AppState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/status", get(status))
        .route("/api/answer", post(answer))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

pub async fn run_server(config: ServerConfig, state: AppState) -> anyhow::Result<()> {
    let app = app_router(state);
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| "invalid host/port for docqa server")?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("docqa listening on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health() -> impl IntoResponse {
    Json(json!({"status":"ok","service":"docqa"}))
}

async fn status(State(state): State<AppState>) -> Json<IndexStatus> {
    Json(state.pipeline.status().await)
}

async fn answer(
    State(state): State<AppState>,
    Json(request): Json<AnswerRequest>,
) -> (StatusCode, Json<AnswerResponse>) {
    match state.pipeline.answer(&request.question).await {
        Ok(answer) => (StatusCode::OK, Json(answer.into())),
        Err(e) => {
            warn!(error = %e, "question refused");
            (status_code(&e), Json(AnswerResponse::refusal(&e)))
        }
    }
}

fn status_code(error: &RagError) -> StatusCode {
    match error {
        RagError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        RagError::IndexNotFound { .. }
        | RagError::IndexCorrupt { .. }
        | RagError::EmbeddingModelMismatch { .. } => StatusCode::SERVICE_UNAVAILABLE,
        RagError::ModelUnavailable { .. } => StatusCode::BAD_GATEWAY,
        RagError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
