//! Admin HTTP server.
//!
//! Exposes ingestion and the chunk preview over a JSON HTTP API so an admin
//! UI can stage, edit, and publish documents.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/sources` | Ingested sources with chunk and pending counts |
//! | `POST` | `/preview` | Chunk `content` without storing it |
//! | `POST` | `/ingest` | Chunk, embed, and store `content` under `source` |
//! | `DELETE` | `/ingest` | Delete every chunk of `source` |
//! | `POST` | `/publish` | Store an edited chunk list under `source` |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "content must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `already_ingested`
//! (409), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so a browser-based admin
//! page on another origin can call the API.

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

use support_kb_core::chunk::ChunkLimits;
use support_kb_core::embedding::EmbeddingProvider;
use support_kb_core::models::{Chunk, SourceSummary};
use support_kb_core::preview::PreviewSession;
use support_kb_core::store::Store;

use crate::config::Config;
use crate::db;
use crate::embedding::create_provider;
use crate::ingest::{ingest_document, publish_chunks, IngestOutcome};
use crate::progress::NoProgress;
use crate::sources::delete_source;
use crate::sqlite_store::SqliteStore;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    store: Arc<dyn Store>,
    provider: Arc<dyn EmbeddingProvider>,
    limits: ChunkLimits,
}

impl AppState {
    pub fn new(
        store: Arc<dyn Store>,
        provider: Arc<dyn EmbeddingProvider>,
        limits: ChunkLimits,
    ) -> Self {
        Self {
            store,
            provider,
            limits,
        }
    }
}

/// Starts the HTTP server on `[server].bind`. Runs until the process exits.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let pool = db::connect(config).await?;
    crate::migrate::migrate_pool(&pool).await?;
    let provider: Arc<dyn EmbeddingProvider> = Arc::from(create_provider(&config.embedding)?);
    let state = AppState::new(
        Arc::new(SqliteStore::new(pool)),
        provider,
        config.chunking.limits(),
    );

    let bind_addr = config.server.bind.clone();
    println!("Server listening on http://{}", bind_addr);
    tracing::info!(bind = %bind_addr, "server started");

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, router(state)).await?;

    Ok(())
}

/// Build the router over an arbitrary store and provider.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/sources", get(handle_sources))
        .route("/preview", post(handle_preview))
        .route("/ingest", post(handle_ingest).delete(handle_delete))
        .route("/publish", post(handle_publish))
        .layer(cors)
        .with_state(state)
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

/// Internal error type that converts into an Axum HTTP response.
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

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

fn already_ingested(source: &str, existing: usize) -> AppError {
    AppError {
        status: StatusCode::CONFLICT,
        code: "already_ingested".to_string(),
        message: format!(
            "{} already has {} chunks; set force to re-ingest",
            source, existing
        ),
    }
}

fn internal(err: anyhow::Error) -> AppError {
    tracing::error!(error = %format!("{:#}", err), "request failed");
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: format!("{:#}", err),
    }
}

fn require(field: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(bad_request(format!("{} must not be empty", field)));
    }
    Ok(())
}

// ============ Handlers ============

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

#[derive(Serialize)]
struct SourcesResponse {
    sources: Vec<SourceSummary>,
}

async fn handle_sources(State(state): State<AppState>) -> Result<Json<SourcesResponse>, AppError> {
    let sources = state.store.list_sources().await.map_err(internal)?;
    Ok(Json(SourcesResponse { sources }))
}

#[derive(Deserialize)]
struct PreviewRequest {
    content: String,
}

#[derive(Serialize)]
struct PreviewResponse {
    chunks: Vec<Chunk>,
}

async fn handle_preview(
    State(state): State<AppState>,
    Json(req): Json<PreviewRequest>,
) -> Result<Json<PreviewResponse>, AppError> {
    require("content", &req.content)?;
    let session = PreviewSession::with_limits("preview", &req.content, &state.limits);
    Ok(Json(PreviewResponse {
        chunks: session.into_chunks(),
    }))
}

#[derive(Deserialize)]
struct IngestRequest {
    source: String,
    content: String,
    #[serde(default)]
    force: bool,
}

#[derive(Serialize)]
struct IngestResponse {
    message: String,
    chunks: usize,
}

fn ingested_response(source: &str, outcome: IngestOutcome) -> Result<Json<IngestResponse>, AppError> {
    match outcome {
        IngestOutcome::Skipped { existing } => Err(already_ingested(source, existing)),
        IngestOutcome::Empty => Err(bad_request("content produced no chunks")),
        IngestOutcome::Ingested {
            chunks, replaced, ..
        } => {
            let message = if replaced > 0 {
                format!("Replaced {} chunks of {} with {}", replaced, source, chunks)
            } else {
                format!("Ingested {} chunks for {}", chunks, source)
            };
            Ok(Json(IngestResponse { message, chunks }))
        }
    }
}

async fn handle_ingest(
    State(state): State<AppState>,
    Json(req): Json<IngestRequest>,
) -> Result<Json<IngestResponse>, AppError> {
    require("source", &req.source)?;
    require("content", &req.content)?;

    let outcome = ingest_document(
        state.store.as_ref(),
        state.provider.as_ref(),
        &req.source,
        &req.content,
        &state.limits,
        req.force,
        &NoProgress,
    )
    .await
    .map_err(internal)?;

    ingested_response(&req.source, outcome)
}

#[derive(Deserialize)]
struct DeleteRequest {
    source: String,
}

#[derive(Serialize)]
struct DeleteResponse {
    message: String,
    deleted: usize,
}

async fn handle_delete(
    State(state): State<AppState>,
    Json(req): Json<DeleteRequest>,
) -> Result<Json<DeleteResponse>, AppError> {
    require("source", &req.source)?;

    let existing = state
        .store
        .count_by_source(&req.source)
        .await
        .map_err(internal)?;
    if existing == 0 {
        return Err(not_found(format!("source not found: {}", req.source)));
    }

    let deleted = delete_source(state.store.as_ref(), &req.source)
        .await
        .map_err(internal)?;
    Ok(Json(DeleteResponse {
        message: format!("Deleted {} chunks for {}", deleted, req.source),
        deleted,
    }))
}

#[derive(Deserialize)]
struct PublishChunk {
    title: String,
    #[serde(default)]
    section: Option<String>,
    content: String,
}

#[derive(Deserialize)]
struct PublishRequest {
    source: String,
    chunks: Vec<PublishChunk>,
    #[serde(default)]
    force: bool,
}

async fn handle_publish(
    State(state): State<AppState>,
    Json(req): Json<PublishRequest>,
) -> Result<Json<IngestResponse>, AppError> {
    require("source", &req.source)?;
    if req.chunks.is_empty() {
        return Err(bad_request("chunks must not be empty"));
    }

    let chunks = req
        .chunks
        .into_iter()
        .enumerate()
        .map(|(index, c)| Chunk {
            index,
            title: c.title,
            section: c.section,
            content: c.content,
        })
        .collect();
    let session = PreviewSession::from_chunks(req.source.as_str(), chunks)
        .map_err(|e| bad_request(e.to_string()))?;

    let outcome = publish_chunks(
        state.store.as_ref(),
        state.provider.as_ref(),
        &req.source,
        session.chunks(),
        req.force,
        &NoProgress,
    )
    .await
    .map_err(internal)?;

    ingested_response(&req.source, outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::DisabledProvider;
    use serde_json::{json, Value};
    use support_kb_core::store::memory::InMemoryStore;

    async fn spawn_server() -> (String, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        let state = AppState::new(
            store.clone(),
            Arc::new(DisabledProvider),
            ChunkLimits::default(),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(state)).await.unwrap();
        });
        (format!("http://{}", addr), store)
    }

    const FAQ: &str = "=====\nSECTION: Withdrawals\n=====\nWithdrawals are processed within two business days.\n";

    #[tokio::test]
    async fn test_health() {
        let (base, _) = spawn_server().await;
        let body: Value = reqwest::get(format!("{}/health", base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_preview_returns_titled_chunks() {
        let (base, store) = spawn_server().await;
        let client = reqwest::Client::new();
        let body: Value = client
            .post(format!("{}/preview", base))
            .json(&json!({ "content": FAQ }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["chunks"][0]["title"], "Withdrawals");
        assert_eq!(body["chunks"][0]["index"], 0);
        assert!(store.list_sources().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_preview_is_bad_request() {
        let (base, _) = spawn_server().await;
        let resp = reqwest::Client::new()
            .post(format!("{}/preview", base))
            .json(&json!({ "content": "   " }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["error"]["code"], "bad_request");
    }

    #[tokio::test]
    async fn test_ingest_without_text_is_bad_request() {
        let (base, store) = spawn_server().await;
        let resp = reqwest::Client::new()
            .post(format!("{}/ingest", base))
            .json(&json!({ "source": "rules", "content": "==========\n" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["error"]["message"], "content produced no chunks");
        assert_eq!(store.count_by_source("rules").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_ingest_conflict_force_and_delete() {
        let (base, store) = spawn_server().await;
        let client = reqwest::Client::new();
        let ingest = |force: bool| {
            client
                .post(format!("{}/ingest", base))
                .json(&json!({ "source": "faq", "content": FAQ, "force": force }))
                .send()
        };

        let resp = ingest(false).await.unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::OK);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["chunks"], 1);

        let resp = ingest(false).await.unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::CONFLICT);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["error"]["code"], "already_ingested");

        let resp = ingest(true).await.unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::OK);
        assert_eq!(store.count_by_source("faq").await.unwrap(), 1);

        let resp = client
            .delete(format!("{}/ingest", base))
            .json(&json!({ "source": "faq" }))
            .send()
            .await
            .unwrap();
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["deleted"], 1);

        let resp = client
            .delete(format!("{}/ingest", base))
            .json(&json!({ "source": "faq" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_publish_edited_chunks() {
        let (base, store) = spawn_server().await;
        let client = reqwest::Client::new();
        let resp = client
            .post(format!("{}/publish", base))
            .json(&json!({
                "source": "refunds",
                "chunks": [
                    { "title": "Refunds", "section": "Refunds", "content": "  Refunds take 5 days.  " },
                    { "title": "Section 9", "content": "Contact support for exceptions." }
                ]
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::OK);

        let rows = store.chunks_for_source("refunds").await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].content, "[Refunds]\n\nRefunds take 5 days.");
        assert_eq!(rows[1].title, "Section 2");
        assert_eq!(rows[1].chunk_index, 1);

        let resp = client
            .post(format!("{}/publish", base))
            .json(&json!({
                "source": "other",
                "chunks": [{ "title": "Section 1", "content": "" }]
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);
    }
}
