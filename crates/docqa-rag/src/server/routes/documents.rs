//! Document management endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::types::{ClearResponse, DeleteResponse, DocumentListResponse, DocumentSummary};

/// GET /documents - List all documents, newest first
pub async fn list_documents(State(state): State<AppState>) -> Json<DocumentListResponse> {
    let documents: Vec<DocumentSummary> = state
        .store()
        .list_documents()
        .iter()
        .map(DocumentSummary::from)
        .collect();

    Json(DocumentListResponse {
        total_count: documents.len(),
        documents,
    })
}

/// GET /documents/:id - Get document details
pub async fn get_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DocumentSummary>> {
    let doc = state
        .store()
        .get_document(&id)
        .ok_or(Error::DocumentNotFound(id))?;

    Ok(Json(DocumentSummary::from(&doc)))
}

/// DELETE /documents/:id - Delete a document and its chunks (idempotent)
pub async fn delete_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeleteResponse>> {
    let store = state.store().clone();
    let deleted_chunks = tokio::task::spawn_blocking(move || store.delete_document(&id))
        .await
        .map_err(|e| Error::internal(format!("Delete task failed: {}", e)))?;

    if deleted_chunks > 0 {
        state.ingest().persist().await;
        tracing::info!("Deleted document {} ({} chunks)", id, deleted_chunks);
    }

    Ok(Json(DeleteResponse {
        success: true,
        document_id: id,
        deleted_chunks,
    }))
}

/// DELETE /documents - Remove every document (idempotent)
pub async fn clear_documents(State(state): State<AppState>) -> Result<Json<ClearResponse>> {
    let store = state.store().clone();
    let (deleted_documents, deleted_chunks) = tokio::task::spawn_blocking(move || {
        let documents = store.document_count();
        (documents, store.clear())
    })
    .await
    .map_err(|e| Error::internal(format!("Clear task failed: {}", e)))?;

    state.ingest().persist().await;
    tracing::info!(
        "Cleared vector store ({} documents, {} chunks)",
        deleted_documents,
        deleted_chunks
    );

    Ok(Json(ClearResponse {
        success: true,
        deleted_documents,
        deleted_chunks,
    }))
}
