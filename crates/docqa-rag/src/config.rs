//! Configuration for the document QA system

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

/// Environment variable pointing at a TOML config file
pub const CONFIG_ENV_VAR: &str = "DOCQA_CONFIG";

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// Embedding configuration
    pub embeddings: EmbeddingConfig,
    /// Chunking configuration
    pub chunking: ChunkingConfig,
    /// Ollama/LLM configuration
    pub llm: LlmConfig,
    /// Retrieval and prompt assembly
    pub retrieval: RetrievalConfig,
    /// Conversation session retention
    pub sessions: SessionConfig,
    /// Vector store configuration
    pub vector_db: VectorDbConfig,
}

impl RagConfig {
    /// Load configuration from a TOML file.
    ///
    /// Falls back to `DOCQA_CONFIG` when no path is given, and to defaults
    /// when neither points at an existing file.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from));

        let config = match path {
            Some(path) if path.exists() => {
                let raw = std::fs::read_to_string(&path)?;
                let config: RagConfig = toml::from_str(&raw).map_err(|e| {
                    Error::InvalidConfig(format!("{}: {}", path.display(), e))
                })?;
                tracing::info!("Loaded configuration from {}", path.display());
                config
            }
            Some(path) => {
                tracing::warn!(
                    "Config file {} not found, using defaults",
                    path.display()
                );
                RagConfig::default()
            }
            None => RagConfig::default(),
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.embeddings.dimensions == 0 {
            return Err(Error::InvalidConfig(
                "embeddings.dimensions must be positive".to_string(),
            ));
        }
        self.chunking.validate()?;
        if self.retrieval.top_k == 0 {
            return Err(Error::InvalidConfig(
                "retrieval.top_k must be positive".to_string(),
            ));
        }
        if self.llm.embed_timeout_secs == 0 || self.llm.generate_timeout_secs == 0 {
            return Err(Error::InvalidConfig(
                "llm timeouts must be finite and positive".to_string(),
            ));
        }
        if self.server.max_upload_size == 0 {
            return Err(Error::InvalidConfig(
                "server.max_upload_size must be positive".to_string(),
            ));
        }
        let prefix = &self.server.api_prefix;
        if !prefix.starts_with('/') || prefix.len() < 2 || prefix.ends_with('/') {
            return Err(Error::InvalidConfig(format!(
                "server.api_prefix ({:?}) must start with '/' and not end with one",
                prefix
            )));
        }
        if let EvictionConfig::MaxSessions { max_sessions: 0 } = self.sessions.eviction {
            return Err(Error::InvalidConfig(
                "sessions.eviction.max_sessions must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Route prefix for the API
    pub api_prefix: String,
    /// Enable CORS
    pub enable_cors: bool,
    /// Maximum upload size in bytes (default: 10MB)
    pub max_upload_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            api_prefix: "/api/v1".to_string(),
            enable_cors: true,
            max_upload_size: 10 * 1024 * 1024, // 10MB
        }
    }
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Model to use
    pub model: String,
    /// Embedding dimensions (768 for nomic-embed-text)
    pub dimensions: usize,
    /// Similarity metric used by the index
    pub metric: SimilarityMetric,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "nomic-embed-text".to_string(),
            dimensions: 768,
            metric: SimilarityMetric::Cosine,
        }
    }
}

/// Similarity metric for vector search
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityMetric {
    /// Cosine similarity
    #[default]
    Cosine,
    /// Raw dot product
    InnerProduct,
}

/// Unit in which chunk sizes are measured
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChunkUnit {
    /// Unicode scalar values
    #[default]
    Chars,
    /// Unicode word-boundary segments (words, spaces, punctuation)
    Tokens,
}

/// Text chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk size in `unit`s
    pub chunk_size: usize,
    /// Overlap between consecutive chunks in `unit`s
    pub chunk_overlap: usize,
    /// Length unit
    pub unit: ChunkUnit,
}

impl ChunkingConfig {
    /// Validate size and overlap
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 || self.chunk_overlap == 0 {
            return Err(Error::InvalidConfig(format!(
                "chunk_size ({}) and chunk_overlap ({}) must be positive",
                self.chunk_size, self.chunk_overlap
            )));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(Error::InvalidConfig(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            unit: ChunkUnit::Chars,
        }
    }
}

/// LLM (Ollama) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Ollama base URL
    pub base_url: String,
    /// Generation model name
    pub generate_model: String,
    /// Use the chat endpoint (structured history) instead of raw completion
    pub use_chat_api: bool,
    /// Temperature for generation
    pub temperature: f32,
    /// Maximum tokens to generate
    pub max_tokens: u32,
    /// Per-attempt timeout for embedding requests in seconds
    pub embed_timeout_secs: u64,
    /// Per-attempt timeout for generation requests in seconds
    pub generate_timeout_secs: u64,
    /// Number of retries for transient failures
    pub max_retries: u32,
    /// Fixed delay between retries in milliseconds
    pub retry_delay_ms: u64,
}

impl LlmConfig {
    /// Embedding timeout as a duration
    pub fn embed_timeout(&self) -> Duration {
        Duration::from_secs(self.embed_timeout_secs)
    }

    /// Generation timeout as a duration
    pub fn generate_timeout(&self) -> Duration {
        Duration::from_secs(self.generate_timeout_secs)
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            generate_model: "llama3.1:8b".to_string(),
            use_chat_api: true,
            temperature: 0.3,  // Lower for more factual answers
            max_tokens: 500,
            embed_timeout_secs: 30,
            generate_timeout_secs: 120,
            max_retries: 2,
            retry_delay_ms: 500,
        }
    }
}

/// Retrieval and prompt assembly configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Number of chunks to retrieve per question
    pub top_k: usize,
    /// Number of most recent turns included in the prompt
    pub history_turns: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            history_turns: 3,
        }
    }
}

/// Session retention configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Eviction policy applied by the periodic sweep
    pub eviction: EvictionConfig,
    /// Seconds between eviction sweeps
    pub sweep_interval_secs: u64,
    /// Cap on turns stored per session (unbounded when unset)
    pub max_stored_turns: Option<usize>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            eviction: EvictionConfig::None,
            sweep_interval_secs: 60,
            max_stored_turns: None,
        }
    }
}

/// Which eviction policy to run
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum EvictionConfig {
    /// Keep sessions until explicitly cleared
    #[default]
    None,
    /// Drop sessions idle for longer than `idle_secs`
    IdleTimeout { idle_secs: u64 },
    /// Keep at most `max_sessions`, dropping least recently used
    MaxSessions { max_sessions: usize },
}

/// Vector store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorDbConfig {
    /// Directory holding `index.bin` and `chunks.json`
    pub storage_dir: PathBuf,
    /// Flush the store to disk after every mutation
    pub persist_on_write: bool,
}

impl Default for VectorDbConfig {
    fn default() -> Self {
        let storage_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("docqa-rag")
            .join("store");

        Self {
            storage_dir,
            persist_on_write: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(RagConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_overlap_not_below_size() {
        let mut config = RagConfig::default();
        config.chunking.chunk_overlap = config.chunking.chunk_size;
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_zero_timeouts() {
        let mut config = RagConfig::default();
        config.llm.generate_timeout_secs = 0;
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let raw = r#"
            [chunking]
            chunk_size = 400
            chunk_overlap = 40
            unit = "tokens"

            [sessions.eviction]
            policy = "idle_timeout"
            idle_secs = 900
        "#;
        let config: RagConfig = toml::from_str(raw).unwrap();
        assert_eq!(config.chunking.chunk_size, 400);
        assert_eq!(config.chunking.unit, ChunkUnit::Tokens);
        assert_eq!(config.retrieval.top_k, 5);
        assert_eq!(
            config.sessions.eviction,
            EvictionConfig::IdleTimeout { idle_secs: 900 }
        );
        assert!(config.validate().is_ok());
    }
}
