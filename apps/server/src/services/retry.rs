use std::future::Future;
use std::time::Duration;

use rand::Rng;

use crate::config::GeneratorConfig;
use crate::generator::GeneratorError;

/// Exponential backoff with jitter around a fallible generator call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of calls, the first one included
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(2000),
            max_jitter: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &GeneratorConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: config.base_delay,
            max_jitter: config.max_jitter,
        }
    }

    /// Delay before the retry that follows failed attempt `attempt` (1-based),
    /// without jitter: `base_delay * 2^(attempt - 1)`
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor)
    }

    fn jitter(&self) -> Duration {
        let max_ms = self.max_jitter.as_millis() as u64;
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::rng().random_range(0..=max_ms))
    }

    /// Runs `op` until it succeeds, fails fatally, or `max_attempts` calls
    /// have been made. `op` receives the 1-based attempt number.
    ///
    /// Non-retryable errors are returned immediately. When attempts run out
    /// the last retryable error is returned.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T, GeneratorError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, GeneratorError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if !e.retryable => {
                    log::warn!("Generator failed fatally on attempt {}: {}", attempt, e);
                    return Err(e);
                }
                Err(e) if attempt >= max_attempts => {
                    log::warn!(
                        "Generator still failing after {} attempts: {}",
                        attempt,
                        e
                    );
                    return Err(e);
                }
                Err(e) => {
                    let delay = self.backoff(attempt) + self.jitter();
                    log::info!(
                        "Generator attempt {} failed ({}), retrying in {}ms",
                        attempt,
                        e,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
