//! Answer generation: prompt assembly and the Ollama client

pub mod ollama;
pub mod prompt;

pub use ollama::{ChatMessage, OllamaClient};
pub use prompt::{Prompt, PromptBuilder, SYSTEM_INSTRUCTION};
