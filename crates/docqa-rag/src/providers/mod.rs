//! Provider abstractions for embeddings and LLM
//!
//! Trait-based seams so the pipeline can run against Ollama in production and
//! against in-process stubs in tests.

pub mod embedding;
pub mod llm;
pub mod ollama;
pub mod retry;

pub use embedding::EmbeddingProvider;
pub use llm::LlmProvider;
pub use ollama::{OllamaEmbedder, OllamaLlm, OllamaProvider};
pub use retry::RetryPolicy;
