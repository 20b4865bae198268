//! Bounded retry with a per-attempt timeout for network providers

use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, timeout};

use crate::config::LlmConfig;
use crate::error::{Error, Result};

/// Retry transient failures a fixed number of times with a fixed delay.
///
/// Every attempt runs under `attempt_timeout`; an attempt that overruns it
/// fails with `Error::Timeout`, which counts as transient.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Pause between attempts
    pub delay: Duration,
    /// Time budget of a single attempt
    pub attempt_timeout: Duration,
}

impl RetryPolicy {
    /// Policy for embedding calls
    pub fn for_embeddings(config: &LlmConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            delay: Duration::from_millis(config.retry_delay_ms),
            attempt_timeout: config.embed_timeout(),
        }
    }

    /// Policy for generation calls
    pub fn for_generation(config: &LlmConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            delay: Duration::from_millis(config.retry_delay_ms),
            attempt_timeout: config.generate_timeout(),
        }
    }

    /// Run `operation` until it succeeds, fails permanently, or retries run out
    pub async fn run<F, Fut, T>(&self, name: &str, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let attempts = self.max_retries + 1;
        let mut attempt = 0;

        loop {
            attempt += 1;
            let result = match timeout(self.attempt_timeout, operation()).await {
                Ok(result) => result,
                Err(_) => Err(Error::Timeout {
                    operation: name.to_string(),
                    millis: self.attempt_timeout.as_millis() as u64,
                }),
            };

            match result {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < attempts => {
                    tracing::warn!(
                        "{} failed (attempt {}/{}), retrying in {:?}: {}",
                        name,
                        attempt,
                        attempts,
                        self.delay,
                        e
                    );
                    sleep(self.delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
