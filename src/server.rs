//! HTTP API for the chat service and knowledge management.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/chat` | Retrieval-backed chat turn |
//! | `POST` | `/api/knowledge/upload` | Upload a knowledge file into a collection |
//! | `GET`  | `/api/knowledge/files` | List knowledge source files |
//! | `DELETE` | `/api/knowledge/files/{filename}` | Delete a source file and rebuild |
//! | `GET`  | `/api/knowledge/collections` | Per-collection status |
//! | `POST` | `/api/knowledge/refresh` | Force a full reingest |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! All error responses carry a machine-readable code and a
//! human-readable message:
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "file is empty" } }
//! ```
//!
//! Codes: `bad_request` (400), `not_found` (404), `config_error` (500),
//! `upstream_error` (502), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so the embeddable
//! web widget can call the API from any page.

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::chat::{ChatRequest, ChatService};
use crate::collections::Category;
use crate::extract::parse_upload;
use crate::knowledge::KnowledgeBase;
use crate::models::{CollectionInfo, KnowledgeFileInfo};

#[derive(Clone)]
struct AppState {
    kb: Arc<KnowledgeBase>,
    chat: Arc<ChatService>,
}

/// Start the HTTP server. Runs until the process is terminated.
pub async fn run_server(
    bind: &str,
    kb: Arc<KnowledgeBase>,
    chat: Arc<ChatService>,
) -> anyhow::Result<()> {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(handle_health))
        .route("/api/chat", post(handle_chat))
        .route("/api/knowledge/upload", post(handle_upload))
        .route("/api/knowledge/files", get(handle_list_files))
        .route("/api/knowledge/files/{filename}", delete(handle_delete_file))
        .route("/api/knowledge/collections", get(handle_collections))
        .route("/api/knowledge/refresh", post(handle_refresh))
        .layer(cors)
        .with_state(AppState { kb, chat });

    tracing::info!("Chat API listening on http://{}", bind);

    let listener = tokio::net::TcpListener::bind(bind).await?;
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

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

/// Map pipeline failures onto the error contract. A missing credential
/// is a configuration error; failures talking to the embedding or
/// generation primitive are upstream errors; anything else is internal.
fn classify_pipeline_error(err: anyhow::Error) -> AppError {
    let msg = format!("{:#}", err);

    if msg.contains("OPENAI_API_KEY") {
        AppError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "config_error".to_string(),
            message: msg,
        }
    } else if msg.contains("API error") || msg.contains("Embedding") || msg.contains("Ollama") {
        AppError {
            status: StatusCode::BAD_GATEWAY,
            code: "upstream_error".to_string(),
            message: msg,
        }
    } else {
        internal(msg)
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

// ============ POST /api/chat ============

async fn handle_chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Response, AppError> {
    if request.message.trim().is_empty() {
        return Err(bad_request("message must not be empty"));
    }

    let response = state
        .chat
        .handle(request)
        .await
        .map_err(classify_pipeline_error)?;

    Ok(Json(response).into_response())
}

// ============ POST /api/knowledge/upload ============

#[derive(Serialize)]
struct UploadResponse {
    success: bool,
    message: String,
    filename: String,
    category: Category,
    size_bytes: usize,
    chunks: usize,
}

async fn handle_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let mut upload: Option<(String, Vec<u8>)> = None;
    let mut collection: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("invalid multipart body: {}", e)))?
    {
        match field.name() {
            Some("file") => {
                let filename = field
                    .file_name()
                    .map(|n| n.to_string())
                    .ok_or_else(|| bad_request("file field is missing a filename"))?;
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| bad_request(format!("failed to read file field: {}", e)))?;
                upload = Some((filename, bytes.to_vec()));
            }
            Some("collection") => {
                collection = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| bad_request(format!("failed to read collection field: {}", e)))?,
                );
            }
            _ => {}
        }
    }

    let (filename, bytes) = upload.ok_or_else(|| bad_request("missing 'file' field"))?;
    let collection = collection.ok_or_else(|| bad_request("missing 'collection' field"))?;

    let category = Category::parse(&collection).ok_or_else(|| {
        bad_request(format!(
            "Invalid collection '{}'. Must be one of: yatras, faqs, policies",
            collection
        ))
    })?;

    let text = parse_upload(&filename, &bytes).map_err(|e| bad_request(e.to_string()))?;

    let chunks = state
        .kb
        .ingest_one(category, &text, &filename)
        .await
        .map_err(classify_pipeline_error)?;

    Ok(Json(UploadResponse {
        success: true,
        message: format!(
            "File '{}' ingested into the {} collection ({} chunks)",
            filename, category, chunks
        ),
        filename,
        category,
        size_bytes: bytes.len(),
        chunks,
    }))
}

// ============ GET /api/knowledge/files ============

#[derive(Serialize)]
struct FileListResponse {
    files: Vec<KnowledgeFileInfo>,
}

async fn handle_list_files(
    State(state): State<AppState>,
) -> Result<Json<FileListResponse>, AppError> {
    let files = state.kb.list_files().map_err(|e| internal(e.to_string()))?;
    Ok(Json(FileListResponse { files }))
}

// ============ DELETE /api/knowledge/files/{filename} ============

#[derive(Serialize)]
struct ActionResponse {
    success: bool,
    message: String,
}

async fn handle_delete_file(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Json<ActionResponse>, AppError> {
    if filename.contains('/') || filename.contains('\\') || filename.contains("..") {
        return Err(bad_request("invalid filename"));
    }
    if !filename.ends_with(".txt") && !filename.ends_with(".md") {
        return Err(bad_request("Can only delete .txt and .md files"));
    }

    let deleted = state
        .kb
        .delete_file(&filename)
        .await
        .map_err(classify_pipeline_error)?;

    if !deleted {
        return Err(not_found(format!("File '{}' not found", filename)));
    }

    Ok(Json(ActionResponse {
        success: true,
        message: format!("File '{}' deleted successfully", filename),
    }))
}

// ============ GET /api/knowledge/collections ============

#[derive(Serialize)]
struct CollectionsResponse {
    collections: Vec<CollectionInfo>,
    total_collections: usize,
    active_collections: usize,
}

async fn handle_collections(
    State(state): State<AppState>,
) -> Result<Json<CollectionsResponse>, AppError> {
    let collections = state
        .kb
        .collections_info()
        .await
        .map_err(|e| internal(e.to_string()))?;
    let active_collections = collections.iter().filter(|c| c.loaded).count();

    Ok(Json(CollectionsResponse {
        total_collections: collections.len(),
        active_collections,
        collections,
    }))
}

// ============ POST /api/knowledge/refresh ============

async fn handle_refresh(
    State(state): State<AppState>,
) -> Result<Json<ActionResponse>, AppError> {
    let summary = state
        .kb
        .refresh()
        .await
        .map_err(classify_pipeline_error)?;

    Ok(Json(ActionResponse {
        success: true,
        message: format!(
            "Knowledge base refreshed: {} collection(s), {} chunk(s)",
            summary.collections, summary.chunks
        ),
    }))
}
