//! LLM provider trait for generating answers

use async_trait::async_trait;
use crate::error::Result;
use crate::generation::Prompt;

/// Trait for LLM-based answer generation
///
/// Implementations:
/// - `OllamaLlm`: Local Ollama server (llama3.1, phi3, etc.)
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate an answer for an assembled prompt, history included
    async fn generate(&self, prompt: &Prompt) -> Result<String>;

    /// Check if the provider is healthy and available
    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    /// Get provider name for logging
    fn name(&self) -> &str;

    /// Get the model being used
    fn model(&self) -> &str;
}
