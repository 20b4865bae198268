//! Response types for questions and document management

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::document::{Chunk, Document, SourceType};

/// Reference to a retrieved passage backing an answer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceReference {
    /// Document ID
    pub document_id: Uuid,
    /// Chunk ID
    pub chunk_id: Uuid,
    /// Chunk position within the document
    pub chunk_ordinal: u32,
    /// Source filename
    pub filename: String,
    /// Similarity score
    pub score: f32,
}

impl SourceReference {
    /// Create a reference from a chunk and its similarity score
    pub fn from_chunk(chunk: &Chunk, score: f32) -> Self {
        Self {
            document_id: chunk.document_id,
            chunk_id: chunk.id,
            chunk_ordinal: chunk.ordinal,
            filename: chunk.source.filename.clone(),
            score,
        }
    }
}

/// Outcome of the answer pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerResult {
    /// Generated (or canned) answer
    pub answer: String,
    /// Retrieved passages in rank order
    pub sources: Vec<SourceReference>,
    /// Session the turn belongs to
    pub session_id: String,
    /// True when no documents were available to answer from
    pub no_context: bool,
}

/// Response body for `POST /question` and `POST /query`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionResponse {
    /// Always true for a rendered answer
    pub success: bool,
    /// Answer text
    pub answer: String,
    /// Source references
    pub sources: Vec<SourceReference>,
    /// Session ID to reuse for follow-up questions
    pub session_id: String,
    /// True when no documents were available
    pub no_context: bool,
}

impl From<AnswerResult> for QuestionResponse {
    fn from(result: AnswerResult) -> Self {
        Self {
            success: true,
            answer: result.answer,
            sources: result.sources,
            session_id: result.session_id,
            no_context: result.no_context,
        }
    }
}

/// Summary of an ingested document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentSummary {
    /// Document ID
    pub id: Uuid,
    /// Filename
    pub filename: String,
    /// Source kind
    pub source_type: SourceType,
    /// Number of chunks created
    pub chunk_count: u32,
    /// Number of pages (if applicable)
    pub total_pages: Option<u32>,
    /// File size in bytes
    pub file_size: u64,
    /// Upload timestamp
    pub uploaded_at: chrono::DateTime<chrono::Utc>,
    /// SHA-256 of the extracted text
    pub content_hash: String,
}

impl From<&Document> for DocumentSummary {
    fn from(doc: &Document) -> Self {
        Self {
            id: doc.id,
            filename: doc.filename.clone(),
            source_type: doc.source_type,
            chunk_count: doc.chunk_count,
            total_pages: doc.total_pages,
            file_size: doc.file_size,
            uploaded_at: doc.uploaded_at,
            content_hash: doc.content_hash.clone(),
        }
    }
}

/// Response body for `POST /upload`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    /// Whether ingestion succeeded
    pub success: bool,
    /// Human readable status
    pub message: String,
    /// The stored document
    pub document: DocumentSummary,
}

/// Response body for `GET /documents`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentListResponse {
    /// Documents, newest first
    pub documents: Vec<DocumentSummary>,
    /// Number of documents
    pub total_count: usize,
}

/// Response body for `DELETE /documents/:id`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteResponse {
    /// Always true, deletion is idempotent
    pub success: bool,
    /// Deleted document ID
    pub document_id: Uuid,
    /// Number of chunks removed (0 when the document was already gone)
    pub deleted_chunks: usize,
}

/// Response body for `DELETE /documents`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClearResponse {
    /// Always true
    pub success: bool,
    /// Number of documents removed
    pub deleted_documents: usize,
    /// Number of chunks removed
    pub deleted_chunks: usize,
}

/// Response body for `DELETE /session/:id`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClearedResponse {
    /// Always true
    pub success: bool,
    /// Session ID
    pub session_id: String,
    /// Whether the session existed
    pub existed: bool,
}
