//! Retry decorator for model drivers.
//!
//! Wraps any [`ModelDriver`] and retries transient backend failures (rate
//! limits, 5xx, timeouts) with exponential backoff. Everything else, and any
//! error that is not a [`ProviderError`], is returned on the first failure.

use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::error::{GatewayError, Result};

use super::{ChatOptions, Content, ModelDriver, ModelResponse, ToolDefinition};

/// A decorator driver that retries transient errors with exponential backoff.
pub struct RetryDriver {
    inner: Box<dyn ModelDriver>,
    /// Retries after the first attempt. Default: 2.
    max_retries: u32,
    /// Base delay for exponential backoff. Default: 500ms.
    base_delay_ms: u64,
    /// Delay cap. Default: 10s.
    max_delay_ms: u64,
}

impl std::fmt::Debug for RetryDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryDriver")
            .field("inner", &self.inner.name())
            .field("max_retries", &self.max_retries)
            .field("base_delay_ms", &self.base_delay_ms)
            .field("max_delay_ms", &self.max_delay_ms)
            .finish()
    }
}

impl RetryDriver {
    pub fn new(inner: Box<dyn ModelDriver>) -> Self {
        Self {
            inner,
            max_retries: 2,
            base_delay_ms: 500,
            max_delay_ms: 10_000,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_base_delay_ms(mut self, base_delay_ms: u64) -> Self {
        self.base_delay_ms = base_delay_ms;
        self
    }

    pub fn with_max_delay_ms(mut self, max_delay_ms: u64) -> Self {
        self.max_delay_ms = max_delay_ms;
        self
    }
}

/// Whether an error is a transient backend failure.
pub fn is_retryable(err: &GatewayError) -> bool {
    match err {
        GatewayError::Provider(pe) => pe.is_retryable(),
        _ => false,
    }
}

/// Backoff for a retry attempt (0-indexed): `min(base * 2^attempt + jitter, max)`.
pub fn compute_delay(attempt: u32, base_delay_ms: u64, max_delay_ms: u64, jitter_ms: u64) -> u64 {
    let exponential = base_delay_ms.saturating_mul(1u64 << attempt.min(16));
    exponential.saturating_add(jitter_ms).min(max_delay_ms)
}

async fn delay_with_jitter(attempt: u32, base_delay_ms: u64, max_delay_ms: u64) {
    // Sub-second clock noise is enough to spread concurrent retries
    let jitter_ms = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| u64::from(d.subsec_nanos()) % base_delay_ms.max(1))
        .unwrap_or(0);
    let delay = compute_delay(attempt, base_delay_ms, max_delay_ms, jitter_ms);
    tokio::time::sleep(Duration::from_millis(delay)).await;
}

#[async_trait]
impl ModelDriver for RetryDriver {
    async fn generate(
        &self,
        system: Option<&str>,
        contents: &[Content],
        tools: &[ToolDefinition],
        options: &ChatOptions,
    ) -> Result<ModelResponse> {
        let mut attempt = 0;
        loop {
            match self.inner.generate(system, contents, tools, options).await {
                Ok(response) => return Ok(response),
                Err(err) if is_retryable(&err) && attempt < self.max_retries => {
                    warn!(
                        provider = self.inner.name(),
                        attempt = attempt + 1,
                        max_retries = self.max_retries,
                        error = %err,
                        "Retrying model request after transient error"
                    );
                    delay_with_jitter(attempt, self.base_delay_ms, self.max_delay_ms).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn default_model(&self) -> &str {
        self.inner.default_model()
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    /// Fails with the given error a fixed number of times, then succeeds.
    struct FlakyDriver {
        failures: u32,
        retryable: bool,
        calls: Arc<AtomicU32>,
    }

    #[async_trait]
    impl ModelDriver for FlakyDriver {
        async fn generate(
            &self,
            _system: Option<&str>,
            _contents: &[Content],
            _tools: &[ToolDefinition],
            _options: &ChatOptions,
        ) -> Result<ModelResponse> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                let err = if self.retryable {
                    ProviderError::RateLimit("slow down".into())
                } else {
                    ProviderError::Auth("bad key".into())
                };
                return Err(err.into());
            }
            Ok(ModelResponse::text("ok"))
        }

        fn default_model(&self) -> &str {
            "flaky-1"
        }

        fn name(&self) -> &str {
            "flaky"
        }
    }

    fn flaky(failures: u32, retryable: bool) -> (RetryDriver, Arc<AtomicU32>) {
        let calls = Arc::new(AtomicU32::new(0));
        let driver = RetryDriver::new(Box::new(FlakyDriver {
            failures,
            retryable,
            calls: Arc::clone(&calls),
        }))
        .with_base_delay_ms(1)
        .with_max_delay_ms(5);
        (driver, calls)
    }

    #[tokio::test]
    async fn test_retries_transient_then_succeeds() {
        let (driver, calls) = flaky(2, true);
        let resp = driver
            .generate(None, &[], &[], &ChatOptions::new())
            .await
            .unwrap();
        assert_eq!(resp.joined_text(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let (driver, calls) = flaky(10, true);
        let driver = driver.with_max_retries(1);
        let err = driver
            .generate(None, &[], &[], &ChatOptions::new())
            .await
            .unwrap_err();
        assert!(is_retryable(&err));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_permanent_error_not_retried() {
        let (driver, calls) = flaky(1, false);
        assert!(driver
            .generate(None, &[], &[], &ChatOptions::new())
            .await
            .is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_delegates_identity() {
        let (driver, _) = flaky(0, true);
        assert_eq!(driver.name(), "flaky");
        assert_eq!(driver.default_model(), "flaky-1");
    }

    #[test]
    fn test_compute_delay() {
        assert_eq!(compute_delay(0, 100, 10_000, 0), 100);
        assert_eq!(compute_delay(3, 100, 10_000, 7), 807);
        assert_eq!(compute_delay(20, 100, 10_000, 0), 10_000);
    }

    #[test]
    fn test_non_provider_errors_not_retryable() {
        assert!(!is_retryable(&GatewayError::Transport("x".into())));
        assert!(is_retryable(&GatewayError::Provider(ProviderError::Timeout(
            "t".into()
        ))));
    }
}
