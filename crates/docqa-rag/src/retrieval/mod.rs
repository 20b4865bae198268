//! Vector storage and exact similarity search

mod index;
mod vector_store;

pub use index::FlatIndex;
pub use vector_store::{ScoredChunk, VectorStore, CHUNKS_FILE, INDEX_FILE};
