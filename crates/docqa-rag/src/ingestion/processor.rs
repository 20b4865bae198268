//! Ingestion pipeline orchestration: parse, chunk, embed, store

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use crate::config::RagConfig;
use crate::error::{Error, Result};
use crate::providers::{EmbeddingProvider, RetryPolicy};
use crate::retrieval::VectorStore;
use crate::types::{ChunkSource, Document, NewChunk, SourceType};

use super::chunker::TextChunker;
use super::parser::DocumentParser;

/// Passage copied out of the blocking parse step
struct PendingChunk {
    ordinal: u32,
    text: String,
    byte_start: usize,
    byte_end: usize,
}

/// Main ingestion pipeline
pub struct IngestPipeline {
    chunker: TextChunker,
    store: Arc<VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    retry: RetryPolicy,
    /// Where to flush the store after mutations, when persistence is on
    storage_dir: Option<PathBuf>,
}

impl IngestPipeline {
    /// Create a new ingestion pipeline
    pub fn new(
        config: &RagConfig,
        store: Arc<VectorStore>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self> {
        Ok(Self {
            chunker: TextChunker::new(&config.chunking)?,
            store,
            embedder,
            retry: RetryPolicy::for_embeddings(&config.llm),
            storage_dir: config
                .vector_db
                .persist_on_write
                .then(|| config.vector_db.storage_dir.clone()),
        })
    }

    /// Full ingestion of one upload. Nothing is stored unless every chunk
    /// was embedded.
    pub async fn ingest(
        &self,
        filename: &str,
        content_type: Option<&str>,
        data: Vec<u8>,
    ) -> Result<Document> {
        let start = Instant::now();
        let source_type = SourceType::resolve(content_type, filename)?;
        let file_size = data.len() as u64;

        let chunker = self.chunker.clone();
        let name = filename.to_string();
        let (parsed, pending) = tokio::task::spawn_blocking(move || -> Result<_> {
            let parsed = DocumentParser::parse(&name, &data, source_type)?;
            let pending: Vec<PendingChunk> = chunker
                .chunk(&parsed.text)
                .map(|p| PendingChunk {
                    ordinal: p.ordinal,
                    text: p.text.to_string(),
                    byte_start: p.byte_start,
                    byte_end: p.byte_end,
                })
                .collect();
            Ok((parsed, pending))
        })
        .await
        .map_err(|e| Error::internal(format!("Parse task failed: {}", e)))??;

        tracing::info!(
            "Parsed {} ({}): {} chars, {} chunks",
            filename,
            source_type,
            parsed.text.len(),
            pending.len()
        );

        let mut chunks = Vec::with_capacity(pending.len());
        for chunk in pending {
            let embedder = &self.embedder;
            let text = chunk.text.as_str();
            let vector = self
                .retry
                .run("embed chunk", || embedder.embed(text))
                .await
                .map_err(|e| {
                    Error::embedding(
                        format!("ingest {} (chunk {})", filename, chunk.ordinal),
                        e.to_string(),
                    )
                })?;

            chunks.push(NewChunk {
                vector,
                ordinal: chunk.ordinal,
                source: ChunkSource {
                    filename: filename.to_string(),
                    source_type,
                    byte_start: chunk.byte_start,
                    byte_end: chunk.byte_end,
                },
                text: chunk.text,
            });
        }

        let mut document = Document::new(
            filename,
            source_type,
            parsed.text,
            parsed.content_hash,
            file_size,
        )
        .with_pages(parsed.total_pages);
        document.chunk_count = chunks.len() as u32;

        let store = Arc::clone(&self.store);
        let stored = document.clone();
        tokio::task::spawn_blocking(move || store.insert_document(stored, chunks))
            .await
            .map_err(|e| Error::internal(format!("Store task failed: {}", e)))??;

        self.persist().await;

        tracing::info!(
            "Ingested {} as {} ({} chunks) in {:.1}s",
            filename,
            document.id,
            document.chunk_count,
            start.elapsed().as_secs_f64()
        );
        Ok(document)
    }

    /// Flush the store to disk when persistence is enabled. Failures are
    /// logged; the in-memory store stays authoritative.
    pub async fn persist(&self) {
        let Some(dir) = self.storage_dir.clone() else {
            return;
        };
        let store = Arc::clone(&self.store);
        match tokio::task::spawn_blocking(move || store.persist(&dir)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!("Failed to persist vector store: {}", e),
            Err(e) => tracing::error!("Persist task failed: {}", e),
        }
    }
}
