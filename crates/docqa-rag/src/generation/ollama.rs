//! Ollama HTTP client for embeddings and answer generation

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::LlmConfig;
use crate::error::{Error, Result};

use super::prompt::Prompt;

/// Ollama API client. Retries are applied by the caller.
pub struct OllamaClient {
    /// HTTP client
    client: Client,
    /// Configuration
    config: LlmConfig,
    /// Embedding model name
    embed_model: String,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_predict: u32,
}

/// One chat message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    /// `system`, `user` or `assistant`
    pub role: String,
    /// Message text
    pub content: String,
}

impl ChatMessage {
    fn new(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: content.into(),
        }
    }
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ChatMessage,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

impl OllamaClient {
    /// Create a new Ollama client
    pub fn new(config: &LlmConfig, embed_model: impl Into<String>) -> Result<Self> {
        let timeout = config.embed_timeout().max(config.generate_timeout());
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(5)
            .build()?;

        Ok(Self {
            client,
            config: config.clone(),
            embed_model: embed_model.into(),
        })
    }

    /// Generation model name
    pub fn generate_model(&self) -> &str {
        &self.config.generate_model
    }

    /// Embedding model name
    pub fn embed_model(&self) -> &str {
        &self.embed_model
    }

    /// Check if Ollama is available
    pub async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/api/tags", self.config.base_url);

        match self.client.get(&url).timeout(Duration::from_secs(5)).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    /// Generate an embedding
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/api/embeddings", self.config.base_url);
        let request = EmbedRequest {
            model: &self.embed_model,
            prompt: text,
        };

        let response = self
            .client
            .post(&url)
            .timeout(self.config.embed_timeout())
            .json(&request)
            .send()
            .await?;
        let response = check_status(response).await?;

        let embed_response: EmbedResponse = response.json().await?;
        if embed_response.embedding.is_empty() {
            return Err(Error::Upstream {
                status: 200,
                message: format!("model {} returned an empty embedding", self.embed_model),
            });
        }

        Ok(embed_response.embedding)
    }

    /// Single-shot completion via `/api/generate`
    pub async fn generate(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/api/generate", self.config.base_url);
        let request = GenerateRequest {
            model: &self.config.generate_model,
            prompt: prompt.to_string(),
            stream: false,
            options: self.options(),
        };

        tracing::debug!("Generating answer with model: {}", self.config.generate_model);

        let response = self
            .client
            .post(&url)
            .timeout(self.config.generate_timeout())
            .json(&request)
            .send()
            .await?;
        let response = check_status(response).await?;

        let generate_response: GenerateResponse = response.json().await?;
        Ok(generate_response.response)
    }

    /// Chat completion via `/api/chat`
    pub async fn chat(&self, messages: Vec<ChatMessage>) -> Result<String> {
        let url = format!("{}/api/chat", self.config.base_url);
        let request = ChatRequest {
            model: &self.config.generate_model,
            messages,
            stream: false,
            options: self.options(),
        };

        tracing::debug!(
            "Chat completion with model {} ({} messages)",
            self.config.generate_model,
            request.messages.len()
        );

        let response = self
            .client
            .post(&url)
            .timeout(self.config.generate_timeout())
            .json(&request)
            .send()
            .await?;
        let response = check_status(response).await?;

        let chat_response: ChatResponse = response.json().await?;
        Ok(chat_response.message.content)
    }

    /// Answer a prompt with the configured API style
    pub async fn answer(&self, prompt: &Prompt) -> Result<String> {
        if self.config.use_chat_api {
            self.chat(chat_messages(prompt)).await
        } else {
            self.generate(&prompt.render()).await
        }
    }

    fn options(&self) -> GenerateOptions {
        GenerateOptions {
            temperature: self.config.temperature,
            num_predict: self.config.max_tokens,
        }
    }
}

/// Map a prompt onto chat messages: system with context, past turns, question
pub fn chat_messages(prompt: &Prompt) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(prompt.history.len() * 2 + 2);
    messages.push(ChatMessage::new("system", prompt.system_message()));
    for turn in &prompt.history {
        messages.push(ChatMessage::new("user", turn.question.clone()));
        messages.push(ChatMessage::new("assistant", turn.answer.clone()));
    }
    messages.push(ChatMessage::new("user", prompt.question.clone()));
    messages
}

/// Turn a non-success status into `Error::Upstream` carrying the body
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(Error::Upstream {
        status: status.as_u16(),
        message: body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::prompt::PromptBuilder;
    use crate::session::ConversationTurn;

    #[test]
    fn test_chat_messages_layout() {
        let history = vec![ConversationTurn {
            question: "What is the capital of France?".into(),
            answer: "Paris [Source 1]".into(),
            asked_at: chrono::Utc::now(),
        }];
        let prompt = PromptBuilder::new(3).build("And its population?", &[], &history);
        let messages = chat_messages(&prompt);

        let roles: Vec<&str> = messages.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, vec!["system", "user", "assistant", "user"]);
        assert!(messages[0].content.contains("Context Documents:"));
        assert_eq!(messages[3].content, "And its population?");
    }

    #[test]
    fn test_client_builds_from_defaults() {
        let client = OllamaClient::new(&LlmConfig::default(), "nomic-embed-text").unwrap();
        assert_eq!(client.embed_model(), "nomic-embed-text");
        assert_eq!(client.generate_model(), "llama3.1:8b");
    }

    #[tokio::test]
    async fn test_unreachable_server_is_transient() {
        let config = LlmConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            ..LlmConfig::default()
        };
        let client = OllamaClient::new(&config, "nomic-embed-text").unwrap();
        let err = client.embed("hello").await.unwrap_err();
        assert!(err.is_transient(), "{err}");
        assert!(!client.health_check().await.unwrap());
    }
}
