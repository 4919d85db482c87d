//! HTTP API for the question-answering pipeline.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/ask` | Answer a question from the corpus |
//! | `GET`  | `/queries` | List recorded questions, newest first |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! All error responses share one shape:
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "question must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `storage_unavailable` (503),
//! `embedding_provider_error` / `completion_provider_error` (502),
//! `dimension_mismatch` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so browser front ends
//! can call the API directly.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use article_qa_core::error::QaError;
use article_qa_core::models::{CompletionChoice, QuerySummary};
use article_qa_core::pipeline::QueryPipeline;
use article_qa_core::store::QueryLog;

use crate::ask::{pipeline_from_config, validate_question};
use crate::config::Config;
use crate::db;
use crate::history::SqliteQueryLog;
use crate::migrate;

/// Shared state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<QueryPipeline>,
    log: Arc<dyn QueryLog>,
}

impl AppState {
    /// `log` serves `GET /queries`; the pipeline records answers only if it
    /// was given its own log.
    pub fn new(pipeline: Arc<QueryPipeline>, log: Arc<dyn QueryLog>) -> Self {
        Self { pipeline, log }
    }
}

/// Build the API router over `state`.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/ask", post(handle_ask))
        .route("/queries", get(handle_queries))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state)
}

/// Starts the HTTP server on `[server].bind`.
///
/// Runs until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let pool = db::connect(config).await?;
    migrate::apply(&pool).await?;
    let log: Arc<dyn QueryLog> = Arc::new(SqliteQueryLog::new(pool));

    let options = config.pipeline_options();
    let persist = options.persist;
    let mut pipeline = pipeline_from_config(config, options)?;
    if persist {
        pipeline = pipeline.with_query_log(log.clone());
    }

    let app = router(AppState::new(Arc::new(pipeline), log));

    let bind_addr = &config.server.bind;
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!(addr = %bind_addr, "server listening");
    println!("aqa server listening on http://{}", bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Error type that converts into a JSON HTTP response.
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

impl From<QaError> for AppError {
    fn from(err: QaError) -> Self {
        let status = match &err {
            QaError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            QaError::EmbeddingProvider(_) | QaError::CompletionProvider(_) => {
                StatusCode::BAD_GATEWAY
            }
            QaError::DimensionMismatch { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        AppError {
            status,
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /ask ============

/// JSON request body for `POST /ask`.
#[derive(Deserialize)]
struct AskRequest {
    #[serde(default)]
    question: String,
    /// Replaces the configured instructions for this request.
    #[serde(default)]
    context: Option<String>,
}

#[derive(Serialize)]
struct AskResponse {
    answer: String,
    choices: Vec<CompletionChoice>,
    record_id: Option<String>,
}

async fn handle_ask(
    State(state): State<AppState>,
    Json(req): Json<AskRequest>,
) -> Result<Json<AskResponse>, AppError> {
    validate_question(&req.question, req.context.as_deref()).map_err(bad_request)?;

    let answer = state
        .pipeline
        .answer(&req.question, req.context.as_deref())
        .await?;

    Ok(Json(AskResponse {
        answer: answer.text,
        choices: answer.choices,
        record_id: answer.record_id,
    }))
}

// ============ GET /queries ============

#[derive(Serialize)]
struct QueriesResponse {
    queries: Vec<QuerySummary>,
}

async fn handle_queries(State(state): State<AppState>) -> Result<Json<QueriesResponse>, AppError> {
    let queries = state.log.list(None).await?;
    Ok(Json(QueriesResponse { queries }))
}
