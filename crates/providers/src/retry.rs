//! Retry wrapper: re-sends a failed request a fixed number of times.
//!
//! Transient failures (network, rate limits, 5xx, unparseable output) are
//! retried after a fixed pause; authentication and configuration failures
//! are returned immediately.

use async_trait::async_trait;
use colonylab_core::error::ProviderError;
use colonylab_core::provider::*;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// A provider that retries its inner provider on failure.
pub struct RetryProvider {
    inner: Arc<dyn colonylab_core::Provider>,
    max_attempts: u32,
    delay: Duration,
}

impl RetryProvider {
    /// Wrap `inner`, making up to `max_attempts` attempts per request.
    pub fn new(inner: Arc<dyn colonylab_core::Provider>, max_attempts: u32, delay: Duration) -> Self {
        Self {
            inner,
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Three attempts, three seconds apart.
    pub fn with_defaults(inner: Arc<dyn colonylab_core::Provider>) -> Self {
        Self::new(inner, 3, Duration::from_secs(3))
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

#[async_trait]
impl colonylab_core::Provider for RetryProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let mut attempt = 1;
        loop {
            match self.inner.complete(request.clone()).await {
                Ok(response) => {
                    if attempt > 1 {
                        info!(provider = %self.inner.name(), attempt, "Retry: request succeeded");
                    }
                    return Ok(response);
                }
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) if attempt >= self.max_attempts => {
                    warn!(
                        provider = %self.inner.name(),
                        attempts = attempt,
                        error = %e,
                        "Retry: giving up"
                    );
                    return Err(e);
                }
                Err(e) => {
                    warn!(
                        provider = %self.inner.name(),
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_secs = self.delay.as_secs_f32(),
                        error = %e,
                        "Retry: request failed, retrying"
                    );
                    tokio::time::sleep(self.delay).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        self.inner.health_check().await
    }
}
