//! Document ingestion: parsing, chunking and embedding uploads

mod chunker;
mod parser;
mod processor;

pub use chunker::{Passage, Passages, TextChunker};
pub use parser::{hash_content, normalize_text, DocumentParser, ParsedDocument};
pub use processor::IngestPipeline;
