use crate::error::RETRYABLE_STATUSES;
use crate::{Error, ErrorContext, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub min_delay_ms: u32,
    pub max_delay_ms: u32,
    pub jitter: bool,
    pub retry_on_status: Vec<u16>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            min_delay_ms: 250,
            max_delay_ms: 8_000,
            jitter: true,
            retry_on_status: RETRYABLE_STATUSES.to_vec(),
        }
    }
}

impl RetryConfig {
    /// No retries at all.
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_delay_ms < self.min_delay_ms {
            return Err(Error::configuration_with_context(
                "retry.max_delay_ms must be >= retry.min_delay_ms",
                ErrorContext::new()
                    .with_field_path("retry.max_delay_ms")
                    .with_details(format!(
                        "min_delay_ms={}, max_delay_ms={}",
                        self.min_delay_ms, self.max_delay_ms
                    )),
            ));
        }
        Ok(())
    }
}

/// Decision after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Retry { delay: Duration },
    Fail,
}

/// Exponential backoff with optional jitter, bounded by a retry count and a delay ceiling.
#[derive(Debug, Clone, Default)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    fn retryable(&self, err: &Error) -> bool {
        match err {
            Error::Remote { status, .. } => self.config.retry_on_status.contains(status),
            other => other.is_retryable(),
        }
    }

    /// `min_delay * 2^attempt`, capped; a server `Retry-After` replaces the computed base.
    pub fn backoff_delay(&self, attempt: u32, retry_after_ms: Option<u32>) -> Duration {
        let base = if self.config.min_delay_ms == 0 {
            0
        } else {
            let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
            self.config.min_delay_ms.saturating_mul(factor)
        };
        let chosen = retry_after_ms.unwrap_or(base).min(self.config.max_delay_ms);
        let mut delay = chosen as u64;
        if self.config.jitter && retry_after_ms.is_none() && delay > 0 {
            // jitter within the upper half of the delay
            let half = delay / 2;
            delay = half + rand::thread_rng().gen_range(0..=delay - half);
        }
        Duration::from_millis(delay)
    }

    /// `attempt` is 0-based (first failure => attempt=0).
    pub fn decide(&self, err: &Error, attempt: u32) -> Decision {
        if self.retryable(err) && attempt < self.config.max_retries {
            Decision::Retry {
                delay: self.backoff_delay(attempt, err.retry_after_ms()),
            }
        } else {
            Decision::Fail
        }
    }

    /// Run `operation` until it succeeds, fails fatally, or retries are exhausted.
    pub async fn run<F, Fut, T>(&self, label: &str, mut operation: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0u32;
        loop {
            match operation(attempt).await {
                Ok(v) => return Ok(v),
                Err(err) => match self.decide(&err, attempt) {
                    Decision::Retry { delay } => {
                        warn!(
                            operation = label,
                            attempt = attempt + 1,
                            delay_ms = delay.as_millis() as u64,
                            error = %err,
                            "retrying after transient failure"
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                    Decision::Fail => return Err(err),
                },
            }
        }
    }
}
