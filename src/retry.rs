use std::time::Duration;

use serde::Deserialize;
use tokio::time::sleep;
use tracing::warn;

/// Configuration for retry behavior of outbound service calls.
#[derive(Debug, Clone, Deserialize)]
pub struct RetryPolicy {
    /// Total number of attempts before the last error is returned.
    #[serde(default = "default_attempts")]
    pub attempts: u32,
    /// Base delay in milliseconds for exponential backoff.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Upper bound on a single backoff delay, in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    10_000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: default_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl RetryPolicy {
    /// Calculate the delay before the next attempt using exponential backoff.
    /// delay = min(base_delay_ms * 2^(attempt - 1), max_delay_ms)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = 2u64.saturating_pow(attempt.saturating_sub(1));
        let ms = self
            .base_delay_ms
            .saturating_mul(exp)
            .min(self.max_delay_ms);
        Duration::from_millis(ms)
    }

    /// Run `op` up to `attempts` times, sleeping between failures.
    ///
    /// Every failed attempt short of the last is logged at warn level under
    /// `name`; the final failure is returned to the caller unchanged.
    pub async fn run<T, E, F>(&self, name: &str, mut op: F) -> Result<T, E>
    where
        F: AsyncFnMut() -> Result<T, E>,
        E: std::fmt::Display,
    {
        let mut attempt = 1u32;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(error) if attempt < self.attempts => {
                    let delay = self.delay_for_attempt(attempt);
                    warn!(
                        operation = name,
                        attempt,
                        max = self.attempts,
                        error = %error,
                        delay_ms = delay.as_millis() as u64,
                        "retrying after failure"
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_values() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.attempts, 3);
        assert_eq!(policy.base_delay_ms, 1000);
        assert_eq!(policy.max_delay_ms, 10_000);
    }

    #[test]
    fn exponential_backoff_schedule() {
        let policy = RetryPolicy {
            attempts: 5,
            base_delay_ms: 1000,
            max_delay_ms: 10_000,
        };
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(1000));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(2000));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(4000));
        assert_eq!(policy.delay_for_attempt(4), Duration::from_millis(8000));
        // Capped by max_delay_ms.
        assert_eq!(policy.delay_for_attempt(5), Duration::from_millis(10_000));
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_transient_failures() {
        let policy = RetryPolicy {
            attempts: 3,
            base_delay_ms: 10,
            max_delay_ms: 100,
        };
        let mut calls = 0u32;
        let result: Result<u32, String> = policy
            .run("test-op", async || {
                calls += 1;
                if calls < 3 {
                    Err(format!("transient {calls}"))
                } else {
                    Ok(calls)
                }
            })
            .await;
        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn returns_last_error_when_exhausted() {
        let policy = RetryPolicy {
            attempts: 2,
            base_delay_ms: 10,
            max_delay_ms: 100,
        };
        let mut calls = 0u32;
        let result: Result<(), String> = policy
            .run("test-op", async || {
                calls += 1;
                Err(format!("failure {calls}"))
            })
            .await;
        assert_eq!(result.unwrap_err(), "failure 2");
        assert_eq!(calls, 2);
    }

    #[tokio::test]
    async fn single_attempt_never_sleeps() {
        let policy = RetryPolicy {
            attempts: 1,
            base_delay_ms: 60_000,
            max_delay_ms: 60_000,
        };
        let result: Result<(), String> = policy.run("test-op", async || Err("boom".into())).await;
        assert_eq!(result.unwrap_err(), "boom");
    }

    #[test]
    fn deserialize_partial_policy() {
        let policy: RetryPolicy = toml::from_str("attempts = 5").unwrap();
        assert_eq!(policy.attempts, 5);
        assert_eq!(policy.base_delay_ms, 1000);
        assert_eq!(policy.max_delay_ms, 10_000);
    }
}
