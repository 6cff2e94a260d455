//! HTTP server.
//!
//! A thin JSON layer over [`ChatService`].
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Status, version, provider, models, backend reachability, chunk count |
//! | `POST` | `/chat` | Run one chat turn |
//! | `POST` | `/reindex` | Rebuild the index from the documents directory |
//! | `POST` | `/memory/{user_id}/clear` | Forget a user's history |
//! | `PUT`  | `/documents/{name}` | Store a document (raw body) and reindex |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "message must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `unsupported_file_type` (415),
//! `embedding_failed` (502), `internal` (500). `/chat` never fails because
//! of a backend; it answers 200 with a degraded reply instead. A message
//! too long for the prompt budget is a `bad_request`.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so a browser front end
//! can call the API directly.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, DefaultBodyLimit, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::chat::{ChatResponse, ChatService, ReindexSummary};
use crate::config::Config;
use crate::error::ChatError;

/// Largest document accepted by `PUT /documents/{name}`.
pub const MAX_DOCUMENT_BYTES: usize = 32 * 1024 * 1024;

/// Builds the application router around a shared service.
pub fn router(service: Arc<ChatService>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/chat", post(handle_chat))
        .route("/reindex", post(handle_reindex))
        .route("/memory/{user_id}/clear", post(handle_clear_memory))
        .route(
            "/documents/{name}",
            put(handle_put_document).layer(DefaultBodyLimit::max(MAX_DOCUMENT_BYTES)),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(service)
}

/// Starts the HTTP server on `[server].bind`.
///
/// The index is built once before listening. If that build fails the server
/// still starts with an empty index; `POST /reindex` can retry later.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let service = Arc::new(ChatService::from_config(config)?);

    match service.reindex().await {
        Ok(summary) => tracing::info!(
            chunks = summary.chunks_indexed,
            skipped = summary.files_skipped,
            "initial index ready"
        ),
        Err(e) => tracing::warn!(error = %e, "initial index build failed, starting empty"),
    }

    let app = router(service);
    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!(bind = %config.server.bind, "listening");
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

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

impl From<ChatError> for AppError {
    fn from(err: ChatError) -> Self {
        let (status, code) = match &err {
            ChatError::UnsupportedFileType(_) => {
                (StatusCode::UNSUPPORTED_MEDIA_TYPE, "unsupported_file_type")
            }
            ChatError::InvalidDocumentName(_) | ChatError::MessageTooLong { .. } => {
                (StatusCode::BAD_REQUEST, "bad_request")
            }
            ChatError::Embedding(_) => (StatusCode::BAD_GATEWAY, "embedding_failed"),
            ChatError::Io { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        };
        if status.is_server_error() {
            tracing::error!(error = %err, "request failed");
        }
        AppError {
            status,
            code,
            message: err.to_string(),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        bad_request(rejection.body_text())
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    /// `"ok"`, or `"degraded"` when the model backend does not answer; chats
    /// still work but get the fallback reply.
    status: &'static str,
    version: &'static str,
    provider: String,
    llm_model: String,
    backend_reachable: bool,
    embedding_model: String,
    embedding_dims: usize,
    chunks_indexed: usize,
}

async fn handle_health(State(service): State<Arc<ChatService>>) -> Json<HealthResponse> {
    let backend = service.backend();
    let backend_reachable = match backend.ping().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(provider = backend.provider(), error = %e, "model backend unreachable");
            false
        }
    };
    let embedder = service.retrieval().embedder();

    Json(HealthResponse {
        status: if backend_reachable { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        provider: backend.provider().to_string(),
        llm_model: backend.model_name().to_string(),
        backend_reachable,
        embedding_model: embedder.model_name().to_string(),
        embedding_dims: embedder.dims(),
        chunks_indexed: service.retrieval().chunk_count(),
    })
}

// ============ POST /chat ============

#[derive(Deserialize)]
struct ChatRequest {
    user_id: String,
    message: String,
    #[serde(default)]
    grounded_only: bool,
}

async fn handle_chat(
    State(service): State<Arc<ChatService>>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, AppError> {
    let Json(req) = payload?;
    if req.user_id.trim().is_empty() {
        return Err(bad_request("user_id must not be empty"));
    }
    if req.message.trim().is_empty() {
        return Err(bad_request("message must not be empty"));
    }

    let response = service
        .chat(&req.user_id, &req.message, req.grounded_only)
        .await?;
    Ok(Json(response))
}

// ============ POST /reindex, PUT /documents/{name} ============

#[derive(Serialize)]
struct IndexInfo {
    chunks: usize,
    dims: usize,
}

#[derive(Serialize)]
struct ReindexResponse {
    ok: bool,
    chunks_indexed: usize,
    files_skipped: usize,
    index: IndexInfo,
}

impl From<ReindexSummary> for ReindexResponse {
    fn from(summary: ReindexSummary) -> Self {
        Self {
            ok: true,
            chunks_indexed: summary.chunks_indexed,
            files_skipped: summary.files_skipped,
            index: IndexInfo {
                chunks: summary.chunks_indexed,
                dims: summary.dims,
            },
        }
    }
}

async fn handle_reindex(
    State(service): State<Arc<ChatService>>,
) -> Result<Json<ReindexResponse>, AppError> {
    let summary = service.reindex().await?;
    Ok(Json(summary.into()))
}

async fn handle_put_document(
    State(service): State<Arc<ChatService>>,
    Path(name): Path<String>,
    body: Bytes,
) -> Result<Json<ReindexResponse>, AppError> {
    let summary = service.add_document(&name, &body).await?;
    Ok(Json(summary.into()))
}

// ============ POST /memory/{user_id}/clear ============

#[derive(Serialize)]
struct ClearResponse {
    ok: bool,
    message: String,
}

async fn handle_clear_memory(
    State(service): State<Arc<ChatService>>,
    Path(user_id): Path<String>,
) -> Json<ClearResponse> {
    service.clear_memory(&user_id);
    Json(ClearResponse {
        ok: true,
        message: format!("memory cleared for {user_id}"),
    })
}
