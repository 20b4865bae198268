//! Document upload endpoint

use axum::{
    extract::{Multipart, State},
    Json,
};

use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::types::{DocumentSummary, UploadResponse};

/// POST /upload - Upload and process one file (multipart field `file`)
pub async fn upload_document(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::InvalidRequest(format!("Failed to read multipart field: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field
            .file_name()
            .map(|s| s.to_string())
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| Error::InvalidRequest("Uploaded file has no filename".to_string()))?;
        let content_type = field.content_type().map(|s| s.to_string());

        let data = field
            .bytes()
            .await
            .map_err(|e| Error::InvalidRequest(format!("Failed to read file: {}", e)))?;
        if data.is_empty() {
            return Err(Error::InvalidRequest(format!("File '{}' is empty", filename)));
        }

        tracing::info!("Processing upload: {} ({} bytes)", filename, data.len());

        let document = state
            .ingest()
            .ingest(&filename, content_type.as_deref(), data.to_vec())
            .await?;

        return Ok(Json(UploadResponse {
            success: true,
            message: format!(
                "Document '{}' processed into {} chunks",
                document.filename, document.chunk_count
            ),
            document: DocumentSummary::from(&document),
        }));
    }

    Err(Error::InvalidRequest(
        "Missing multipart field 'file'".to_string(),
    ))
}
