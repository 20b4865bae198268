//! Retrieval-augmented answer pipeline

use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

use crate::config::RagConfig;
use crate::error::{Error, Result};
use crate::generation::PromptBuilder;
use crate::providers::{EmbeddingProvider, LlmProvider, RetryPolicy};
use crate::retrieval::VectorStore;
use crate::session::{ConversationTurn, SessionStore};
use crate::types::{AnswerResult, SourceReference};

/// Answer returned when no documents have been uploaded
pub const NO_DOCUMENTS_ANSWER: &str =
    "No documents have been uploaded yet. Please upload a document before asking questions.";

/// Stages a question moves through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Received,
    EmbeddingQuery,
    Retrieving,
    PromptAssembly,
    Generating,
    Complete,
    Failed,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Received => "received",
            Self::EmbeddingQuery => "embedding_query",
            Self::Retrieving => "retrieving",
            Self::PromptAssembly => "prompt_assembly",
            Self::Generating => "generating",
            Self::Complete => "complete",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Tracks the current stage of one request for logging
struct StageTracker<'a> {
    session_id: &'a str,
    stage: PipelineStage,
}

impl StageTracker<'_> {
    fn enter(&mut self, stage: PipelineStage) {
        tracing::debug!(session_id = %self.session_id, from = %self.stage, to = %stage, "pipeline stage");
        self.stage = stage;
    }
}

/// Question answering over the vector store with conversation memory
pub struct AnswerPipeline {
    store: Arc<VectorStore>,
    sessions: Arc<SessionStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    llm: Arc<dyn LlmProvider>,
    prompt_builder: PromptBuilder,
    top_k: usize,
    embed_retry: RetryPolicy,
    generate_retry: RetryPolicy,
}

impl AnswerPipeline {
    /// Create a new pipeline
    pub fn new(
        config: &RagConfig,
        store: Arc<VectorStore>,
        sessions: Arc<SessionStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        llm: Arc<dyn LlmProvider>,
    ) -> Self {
        Self {
            store,
            sessions,
            embedder,
            llm,
            prompt_builder: PromptBuilder::new(config.retrieval.history_turns),
            top_k: config.retrieval.top_k,
            embed_retry: RetryPolicy::for_embeddings(&config.llm),
            generate_retry: RetryPolicy::for_generation(&config.llm),
        }
    }

    /// Embedding provider
    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedder
    }

    /// Generation provider
    pub fn llm(&self) -> &Arc<dyn LlmProvider> {
        &self.llm
    }

    /// Answer a question, continuing `session_id` or starting a new session.
    ///
    /// Requests on the same session are serialized in arrival order. A turn
    /// is recorded only when generation succeeds.
    pub async fn answer(&self, question: &str, session_id: Option<String>) -> Result<AnswerResult> {
        let session_id = session_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let mut tracker = StageTracker {
            session_id: &session_id,
            stage: PipelineStage::Received,
        };

        let outcome = self.run(question, &session_id, &mut tracker).await;

        // A session that never recorded a turn is not kept around
        if !matches!(&outcome, Ok(result) if !result.no_context) {
            self.sessions.release_if_empty(&session_id);
        }

        match outcome {
            Ok(result) => {
                tracker.enter(PipelineStage::Complete);
                Ok(result)
            }
            Err(e) => {
                tracing::warn!(
                    session_id = %session_id,
                    stage = %tracker.stage,
                    "question failed: {}",
                    e
                );
                tracker.enter(PipelineStage::Failed);
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        question: &str,
        session_id: &str,
        tracker: &mut StageTracker<'_>,
    ) -> Result<AnswerResult> {
        let question = question.trim();
        if question.is_empty() {
            return Err(Error::InvalidRequest("question must not be empty".to_string()));
        }

        if self.store.is_empty() {
            tracing::info!(session_id = %session_id, "no documents uploaded, returning canned answer");
            return Ok(self.no_documents(session_id));
        }

        let session = self.sessions.acquire(session_id);
        let mut session = session.lock().await;

        tracker.enter(PipelineStage::EmbeddingQuery);
        let embedder = &self.embedder;
        let embedding = self
            .embed_retry
            .run("embed query", || embedder.embed(question))
            .await
            .map_err(|e| Error::embedding("query", e.to_string()))?;

        tracker.enter(PipelineStage::Retrieving);
        let store = Arc::clone(&self.store);
        let top_k = self.top_k;
        let results = match tokio::task::spawn_blocking(move || store.search(&embedding, top_k))
            .await
            .map_err(|e| Error::internal(format!("Search task failed: {}", e)))?
        {
            Ok(results) => results,
            Err(Error::EmptyStore { .. }) => {
                tracing::info!(session_id = %session_id, "store emptied concurrently, returning canned answer");
                return Ok(self.no_documents(session_id));
            }
            Err(e) => return Err(e),
        };
        tracing::debug!(session_id = %session_id, "retrieved {} chunks", results.len());

        tracker.enter(PipelineStage::PromptAssembly);
        let prompt = self.prompt_builder.build(question, &results, &session.turns);

        tracker.enter(PipelineStage::Generating);
        let llm = &self.llm;
        let prompt = &prompt;
        let answer = self
            .generate_retry
            .run("generate answer", || llm.generate(prompt))
            .await
            .map_err(|e| Error::generation(llm.model(), e.to_string()))?;

        session.push_turn(
            ConversationTurn {
                question: question.to_string(),
                answer: answer.clone(),
                asked_at: chrono::Utc::now(),
            },
            self.sessions.max_stored_turns(),
        );

        Ok(AnswerResult {
            answer,
            sources: results
                .iter()
                .map(|r| SourceReference::from_chunk(&r.chunk, r.score))
                .collect(),
            session_id: session_id.to_string(),
            no_context: false,
        })
    }

    fn no_documents(&self, session_id: &str) -> AnswerResult {
        AnswerResult {
            answer: NO_DOCUMENTS_ANSWER.to_string(),
            sources: Vec::new(),
            session_id: session_id.to_string(),
            no_context: true,
        }
    }
}
