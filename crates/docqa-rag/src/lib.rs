//! docqa-rag: document question answering with source references
//!
//! Uploaded documents are parsed to text, split into overlapping passages,
//! embedded and kept in an exact similarity index. Questions are answered by
//! a language model grounded on the most similar passages, with per-session
//! conversation history.

pub mod config;
pub mod error;
pub mod generation;
pub mod ingestion;
pub mod pipeline;
pub mod providers;
pub mod retrieval;
pub mod server;
pub mod session;
pub mod types;

pub use config::RagConfig;
pub use error::{Error, Result};
pub use pipeline::AnswerPipeline;
pub use retrieval::VectorStore;
pub use session::SessionStore;
pub use types::{
    document::{Chunk, ChunkSource, Document, SourceType},
    query::{QueryRequest, QuestionRequest},
    response::{AnswerResult, QuestionResponse, SourceReference},
};
