// src/provider/retry.rs — Retry with exponential backoff
//
// Wraps a ModelProvider and retries transient failures: rate limits,
// server errors, connection resets and request timeouts. Bad requests and
// auth failures go straight back to the caller.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::{ChatRequest, ChatResponse, ModelProvider};
use crate::infra::errors::RedraftError;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub backoff_factor: f64,
    pub max_delay: Duration,
    pub jitter_fraction: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(1_000),
            backoff_factor: 2.0,
            max_delay: Duration::from_millis(20_000),
            jitter_fraction: 0.2,
        }
    }
}

impl RetryConfig {
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Delay before retry `attempt` (0-indexed). A server-supplied
    /// retry-after wins over the exponential schedule.
    pub fn delay_for_attempt(&self, attempt: u32, server_hint: Option<Duration>) -> Duration {
        if let Some(hint) = server_hint {
            return hint + Duration::from_millis(100);
        }

        let base_ms =
            self.initial_delay.as_millis() as f64 * self.backoff_factor.powi(attempt as i32);
        let capped_ms = base_ms.min(self.max_delay.as_millis() as f64);
        let jittered = capped_ms * deterministic_jitter(attempt, self.jitter_fraction);

        Duration::from_millis(jittered.max(1.0) as u64)
    }
}

/// Multiplier in `[1 - fraction, 1 + fraction]`, fixed per attempt so
/// schedules are reproducible.
fn deterministic_jitter(attempt: u32, fraction: f64) -> f64 {
    let hash = attempt.wrapping_mul(2_654_435_761) as f64 / u32::MAX as f64;
    1.0 + fraction * (2.0 * hash - 1.0)
}

fn server_hint(error: &RedraftError) -> Option<Duration> {
    match error {
        RedraftError::RateLimited { retry_after_ms, .. } if *retry_after_ms > 0 => {
            Some(Duration::from_millis(*retry_after_ms))
        }
        _ => None,
    }
}

pub struct RetryProvider {
    inner: Arc<dyn ModelProvider>,
    config: RetryConfig,
}

impl RetryProvider {
    pub fn new(inner: Arc<dyn ModelProvider>) -> Self {
        Self::with_config(inner, RetryConfig::default())
    }

    pub fn with_config(inner: Arc<dyn ModelProvider>, config: RetryConfig) -> Self {
        Self { inner, config }
    }
}

#[async_trait]
impl ModelProvider for RetryProvider {
    fn id(&self) -> &str {
        self.inner.id()
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, RedraftError> {
        let mut attempt = 0;
        loop {
            match self.inner.chat(request.clone()).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_retriable() && attempt < self.config.max_retries => {
                    let delay = self.config.delay_for_attempt(attempt, server_hint(&e));
                    tracing::warn!(
                        provider = self.inner.id(),
                        attempt = attempt + 1,
                        max_retries = self.config.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        "Retrying after error: {}",
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
