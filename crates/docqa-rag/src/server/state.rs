//! Application state for the document QA server

use parking_lot::RwLock;
use std::sync::Arc;

use crate::config::RagConfig;
use crate::error::{Error, Result};
use crate::ingestion::IngestPipeline;
use crate::pipeline::AnswerPipeline;
use crate::providers::{EmbeddingProvider, LlmProvider, OllamaProvider};
use crate::retrieval::VectorStore;
use crate::session::SessionStore;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Configuration
    config: RagConfig,
    /// Chunks, documents and index
    store: Arc<VectorStore>,
    /// Conversation sessions
    sessions: Arc<SessionStore>,
    /// Upload processing
    ingest: Arc<IngestPipeline>,
    /// Question answering
    pipeline: Arc<AnswerPipeline>,
    /// Ready state
    ready: RwLock<bool>,
}

impl AppState {
    /// Create new application state backed by Ollama
    pub async fn new(config: RagConfig) -> Result<Self> {
        let (embedder, llm) = OllamaProvider::new(&config)?.split();
        tracing::info!(
            "Ollama client initialized (embeddings: {}, generation: {})",
            config.embeddings.model,
            config.llm.generate_model
        );
        Self::with_providers(config, Arc::new(embedder), Arc::new(llm)).await
    }

    /// Create application state with explicit providers
    pub async fn with_providers(
        config: RagConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        llm: Arc<dyn LlmProvider>,
    ) -> Result<Self> {
        config.validate()?;
        tracing::info!("Initializing application state...");

        let store = Arc::new(Self::open_store(&config).await?);
        let sessions = Arc::new(SessionStore::new(&config.sessions));
        let ingest = Arc::new(IngestPipeline::new(&config, Arc::clone(&store), Arc::clone(&embedder))?);
        let pipeline = Arc::new(AnswerPipeline::new(
            &config,
            Arc::clone(&store),
            Arc::clone(&sessions),
            embedder,
            llm,
        ));

        tracing::info!(
            "Vector store ready ({} documents, {} chunks)",
            store.document_count(),
            store.len()
        );

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                store,
                sessions,
                ingest,
                pipeline,
                ready: RwLock::new(true),
            }),
        })
    }

    /// Restore the persisted store, falling back to an empty one when the
    /// files are missing or corrupted
    async fn open_store(config: &RagConfig) -> Result<VectorStore> {
        let dimension = config.embeddings.dimensions;
        let metric = config.embeddings.metric;
        let dir = config.vector_db.storage_dir.clone();

        if !config.vector_db.persist_on_write || !VectorStore::has_persisted(&dir) {
            return Ok(VectorStore::new(dimension, metric));
        }

        let restored = tokio::task::spawn_blocking(move || VectorStore::restore(&dir, dimension, metric))
            .await
            .map_err(|e| Error::internal(format!("Restore task failed: {}", e)))?;

        match restored {
            Ok(store) => Ok(store),
            Err(e @ Error::StoreCorrupted { .. }) => {
                tracing::warn!("{}; starting with an empty store", e);
                Ok(VectorStore::new(dimension, metric))
            }
            Err(e) => Err(e),
        }
    }

    /// Get configuration
    pub fn config(&self) -> &RagConfig {
        &self.inner.config
    }

    /// Get vector store
    pub fn store(&self) -> &Arc<VectorStore> {
        &self.inner.store
    }

    /// Get session store
    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.inner.sessions
    }

    /// Get ingestion pipeline
    pub fn ingest(&self) -> &Arc<IngestPipeline> {
        &self.inner.ingest
    }

    /// Get answer pipeline
    pub fn pipeline(&self) -> &Arc<AnswerPipeline> {
        &self.inner.pipeline
    }

    /// Check if ready
    pub fn is_ready(&self) -> bool {
        *self.inner.ready.read()
    }

    /// Set ready state
    pub fn set_ready(&self, ready: bool) {
        *self.inner.ready.write() = ready;
    }
}
