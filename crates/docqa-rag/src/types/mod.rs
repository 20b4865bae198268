//! Core types for the document QA system

pub mod document;
pub mod query;
pub mod response;

pub use document::{Chunk, ChunkSource, Document, NewChunk, SourceType};
pub use query::{QueryRequest, QuestionRequest};
pub use response::{
    AnswerResult, ClearResponse, DeleteResponse, DocumentListResponse, DocumentSummary,
    QuestionResponse, SessionClearedResponse, SourceReference, UploadResponse,
};
