use anyhow::{anyhow, Result};
use std::future::Future;
use std::time::Duration;

/// Timeout and retry-with-backoff policy for remote calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, at least one
    pub attempts: u32,
    /// Delay before the second attempt; doubles on every further attempt
    pub base_delay: Duration,
    /// Upper bound for a single attempt
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_millis(500),
            timeout: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// A single attempt with the given timeout
    pub fn once(timeout: Duration) -> Self {
        Self {
            attempts: 1,
            base_delay: Duration::ZERO,
            timeout,
        }
    }

    /// Backoff before attempt number `attempt` (1-based, so attempt 2 waits `base_delay`)
    pub fn delay_before(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(2).min(16);
        self.base_delay.saturating_mul(1 << exponent)
    }

    /// Run `op` until it succeeds, the attempts are used up, or it times out each time
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let attempts = self.attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            if attempt > 1 {
                let delay = self.delay_before(attempt);
                log::debug!("Retrying {label} in {delay:?} (attempt {attempt}/{attempts})");
                tokio::time::sleep(delay).await;
            }

            match tokio::time::timeout(self.timeout, op()).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(e)) => {
                    log::warn!("{label} failed (attempt {attempt}/{attempts}): {e:#}");
                    last_error = Some(e);
                }
                Err(_) => {
                    log::warn!(
                        "{label} timed out after {:?} (attempt {attempt}/{attempts})",
                        self.timeout
                    );
                    last_error = Some(anyhow!("{label} timed out after {:?}", self.timeout));
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| anyhow!("{label} failed"))
            .context(format!("{label} failed after {attempts} attempt(s)")))
    }
}
