//! Exponential-backoff retry, ported from `execution-engine/src/retry.rs`
//! and parameterized for spec §5's "30-second timeout, up to four
//! exponential-backoff retries (2, 4, 8, 16 seconds)".

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Default per-call network timeout (spec §5).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_delay_ms: u64,
    max_delay_ms: u64,
    backoff_multiplier: f64,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_delay_ms: u64) -> Self {
        Self {
            max_attempts,
            initial_delay_ms,
            max_delay_ms: 30_000,
            backoff_multiplier: 2.0,
        }
    }

    pub fn with_max_delay(mut self, max_delay_ms: u64) -> Self {
        self.max_delay_ms = max_delay_ms;
        self
    }

    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// The policy spec §5 calls for: an initial attempt plus four retries at
    /// 2s, 4s, 8s, 16s.
    pub fn network() -> Self {
        Self::new(5, 2_000).with_max_delay(16_000)
    }

    /// Execute with exponential backoff retry.
    pub async fn execute<F, Fut, T, E>(&self, mut f: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Debug,
    {
        let mut attempts = 0;
        let mut delay = self.initial_delay_ms;

        loop {
            match f().await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    attempts += 1;
                    if attempts >= self.max_attempts {
                        return Err(e);
                    }

                    let jitter = (rand::random::<f64>() * 0.3) + 0.85;
                    let backoff_delay = (delay as f64 * jitter) as u64;
                    let capped_delay = backoff_delay.min(self.max_delay_ms);

                    tracing::warn!(
                        "retry attempt {}/{} after {:?}, error: {:?}",
                        attempts,
                        self.max_attempts,
                        Duration::from_millis(capped_delay),
                        e
                    );

                    sleep(Duration::from_millis(capped_delay)).await;
                    delay = (delay as f64 * self.backoff_multiplier) as u64;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn retry_succeeds_on_second_attempt() {
        let policy = RetryPolicy::new(3, 10);
        let mut attempts = 0;

        let result = policy
            .execute(|| async {
                attempts += 1;
                if attempts < 2 {
                    Err("temporary error")
                } else {
                    Ok(42)
                }
            })
            .await;

        assert_eq!(result, Ok(42));
        assert_eq!(attempts, 2);
    }

    #[tokio::test]
    async fn retry_gives_up_after_max_attempts() {
        let policy = RetryPolicy::new(3, 10);
        let mut attempts = 0;

        let result = policy
            .execute(|| async {
                attempts += 1;
                Err::<i32, &str>("persistent error")
            })
            .await;

        assert!(result.is_err());
        assert_eq!(attempts, 3);
    }

    #[test]
    fn network_policy_matches_spec_backoff() {
        let policy = RetryPolicy::network();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.initial_delay_ms, 2_000);
        assert_eq!(policy.max_delay_ms, 16_000);
    }
}
