//! API routes for the document QA server

pub mod documents;
pub mod ingest;
pub mod query;
pub mod sessions;

use axum::{
    extract::{DefaultBodyLimit, State},
    routing::{delete, get, post},
    Json, Router,
};
use serde::Serialize;

use crate::server::state::AppState;

/// Build all API routes
pub fn api_routes(max_upload_size: usize) -> Router<AppState> {
    Router::new()
        // Upload - with larger body limit for files
        .route(
            "/upload",
            post(ingest::upload_document).layer(DefaultBodyLimit::max(max_upload_size)),
        )
        // Questions
        .route("/question", post(query::ask_question))
        .route("/query", post(query::query))
        // Document management
        .route(
            "/documents",
            get(documents::list_documents).delete(documents::clear_documents),
        )
        .route("/documents/clear", delete(documents::clear_documents))
        .route(
            "/documents/:id",
            get(documents::get_document).delete(documents::delete_document),
        )
        // Conversations
        .route("/session/:id", delete(sessions::clear_session))
        // Status and info
        .route("/status", get(status))
        .route("/info", get(info))
}

/// Service status snapshot
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub document_count: usize,
    pub chunk_count: usize,
    pub session_count: usize,
    pub embedding_provider: String,
    pub embedding_model: String,
    pub embedding_dimensions: usize,
    pub llm_provider: String,
    pub llm_model: String,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
    pub eviction_policy: String,
    pub persistence: bool,
}

/// GET /status - Configuration summary and store counts
async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let config = state.config();
    let pipeline = state.pipeline();

    Json(StatusResponse {
        status: if state.is_ready() { "ready" } else { "starting" },
        version: env!("CARGO_PKG_VERSION"),
        document_count: state.store().document_count(),
        chunk_count: state.store().len(),
        session_count: state.sessions().len(),
        embedding_provider: pipeline.embedder().name().to_string(),
        embedding_model: config.embeddings.model.clone(),
        embedding_dimensions: pipeline.embedder().dimensions(),
        llm_provider: pipeline.llm().name().to_string(),
        llm_model: pipeline.llm().model().to_string(),
        chunk_size: config.chunking.chunk_size,
        chunk_overlap: config.chunking.chunk_overlap,
        top_k: config.retrieval.top_k,
        eviction_policy: state.sessions().policy().name().to_string(),
        persistence: config.vector_db.persist_on_write,
    })
}

/// API info endpoint
async fn info(State(state): State<AppState>) -> Json<serde_json::Value> {
    let prefix = &state.config().server.api_prefix;
    let mut endpoints = serde_json::Map::new();
    for (method, path, description) in [
        ("POST", "/upload", "Upload and process a document (multipart field 'file')"),
        ("POST", "/question", "Ask a question about the uploaded documents"),
        ("POST", "/query", "Alias of /question taking 'query'"),
        ("GET", "/documents", "List all documents"),
        ("GET", "/documents/:id", "Get document details"),
        ("DELETE", "/documents/:id", "Delete a document"),
        ("DELETE", "/documents", "Delete all documents"),
        ("DELETE", "/documents/clear", "Alias of DELETE /documents"),
        ("DELETE", "/session/:id", "Clear a conversation"),
        ("GET", "/status", "Service status"),
    ] {
        endpoints.insert(format!("{} {}{}", method, prefix, path), description.into());
    }
    endpoints.insert("GET /health".to_string(), "Liveness check".into());
    endpoints.insert("GET /ready".to_string(), "Readiness check".into());

    Json(serde_json::json!({
        "name": "docqa-rag",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Document question answering with source references",
        "endpoints": endpoints,
        "supported_formats": [
            "text/plain",
            "text/markdown",
            "application/pdf",
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        ]
    }))
}
