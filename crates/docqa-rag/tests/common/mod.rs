//! In-process stand-ins for the embedding and generation services.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use docqa_rag::config::RagConfig;
use docqa_rag::error::{Error, Result};
use docqa_rag::generation::Prompt;
use docqa_rag::providers::{EmbeddingProvider, LlmProvider};
use docqa_rag::{AnswerPipeline, SessionStore, VectorStore};

pub const DIM: usize = 64;

/// Config sized for the stubs: small vectors, fast retries, no persistence.
pub fn test_config() -> RagConfig {
    let mut config = RagConfig::default();
    config.embeddings.dimensions = DIM;
    config.chunking.chunk_size = 200;
    config.chunking.chunk_overlap = 20;
    config.llm.max_retries = 2;
    config.llm.retry_delay_ms = 1;
    config.llm.embed_timeout_secs = 1;
    config.llm.generate_timeout_secs = 1;
    config.vector_db.persist_on_write = false;
    config
}

/// Bag-of-words embedder: each lowercase word adds weight to one hashed bucket.
#[derive(Debug, Default)]
pub struct HashEmbedder {
    pub calls: AtomicUsize,
}

impl HashEmbedder {
    pub fn vector(text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; DIM];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let word = word.to_lowercase();
            let mut h: u64 = 0xcbf29ce484222325;
            for b in word.bytes() {
                h ^= b as u64;
                h = h.wrapping_mul(0x100000001b3);
            }
            v[(h % DIM as u64) as usize] += 1.0;
        }
        v
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Self::vector(text))
    }

    fn dimensions(&self) -> usize {
        DIM
    }

    fn name(&self) -> &str {
        "hash"
    }
}

/// Embedder that always reports the service as unreachable.
#[derive(Debug, Default)]
pub struct DownEmbedder {
    pub calls: AtomicUsize,
}

#[async_trait]
impl EmbeddingProvider for DownEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(Error::Upstream {
            status: 503,
            message: "embedding model loading".to_string(),
        })
    }

    fn dimensions(&self) -> usize {
        DIM
    }

    fn name(&self) -> &str {
        "down"
    }
}

/// What a scripted LLM does on each call.
#[derive(Debug, Clone)]
pub enum Behavior {
    Answer(String),
    /// Fail with a transient error for the first N calls, then answer.
    FlakyThenAnswer(usize, String),
    /// Fail with HTTP 400 every time.
    Reject,
    /// Never return.
    Hang,
}

/// LLM stub that records every prompt it is given.
#[derive(Debug)]
pub struct ScriptedLlm {
    behavior: Behavior,
    pub calls: AtomicUsize,
    pub prompts: Mutex<Vec<Prompt>>,
}

impl ScriptedLlm {
    pub fn new(behavior: Behavior) -> Self {
        Self {
            behavior,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn answering(answer: &str) -> Self {
        Self::new(Behavior::Answer(answer.to_string()))
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> Option<Prompt> {
        self.prompts.lock().last().cloned()
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlm {
    async fn generate(&self, prompt: &Prompt) -> Result<String> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().push(prompt.clone());

        match &self.behavior {
            Behavior::Answer(a) => Ok(a.clone()),
            Behavior::FlakyThenAnswer(failures, a) => {
                if n < *failures {
                    Err(Error::Upstream {
                        status: 503,
                        message: "model busy".to_string(),
                    })
                } else {
                    Ok(a.clone())
                }
            }
            Behavior::Reject => Err(Error::Upstream {
                status: 400,
                message: "bad request".to_string(),
            }),
            Behavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(String::new())
            }
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "stub-model"
    }
}

/// A pipeline over a fresh store, plus handles to everything it touches.
pub struct Harness {
    pub config: RagConfig,
    pub store: Arc<VectorStore>,
    pub sessions: Arc<SessionStore>,
    pub embedder: Arc<HashEmbedder>,
    pub llm: Arc<ScriptedLlm>,
    pub pipeline: AnswerPipeline,
}

impl Harness {
    pub fn new(llm: ScriptedLlm) -> Self {
        Self::with_config(test_config(), llm)
    }

    pub fn with_config(config: RagConfig, llm: ScriptedLlm) -> Self {
        let store = Arc::new(VectorStore::new(
            config.embeddings.dimensions,
            config.embeddings.metric,
        ));
        let sessions = Arc::new(SessionStore::new(&config.sessions));
        let embedder = Arc::new(HashEmbedder::default());
        let llm = Arc::new(llm);
        let pipeline = AnswerPipeline::new(
            &config,
            Arc::clone(&store),
            Arc::clone(&sessions),
            embedder.clone(),
            llm.clone(),
        );
        Self {
            config,
            store,
            sessions,
            embedder,
            llm,
            pipeline,
        }
    }
}
