//! Bounded retry with linear backoff.
//!
//! Only errors for which `GroundError::is_retryable` holds are retried
//! (HTTP 403/429, transport failures, timeouts). The delay is injected so
//! tests run the retry path without sleeping.

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::constants::retry as retry_constants;
use crate::types::Result;

/// Waits between attempts
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Production sleeper backed by the tokio timer
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, first call included
    pub max_attempts: u32,
    /// Wait after failed attempt `n` is `n * base_delay`
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: retry_constants::MAX_ATTEMPTS,
            base_delay: Duration::from_secs(retry_constants::BASE_DELAY_SECS),
        }
    }
}

impl RetryPolicy {
    /// Delay after the 1-based `attempt` failed
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// attempt budget runs out. `mask` scrubs credentials from logged errors.
    pub async fn run<T, F, Fut, M>(&self, sleeper: &dyn Sleeper, mut op: F, mask: M) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
        M: Fn(&str) -> String,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < max_attempts => {
                    let wait = self.delay_for(attempt);
                    warn!(
                        attempt,
                        max_attempts,
                        status = err.status(),
                        wait_secs = wait.as_secs(),
                        error = %mask(&err.to_string()),
                        "Retrying LLM request"
                    );
                    sleeper.sleep(wait).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::types::GroundError;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Records requested delays instead of sleeping
    #[derive(Default)]
    pub(crate) struct RecordingSleeper {
        pub(crate) delays: Mutex<Vec<Duration>>,
    }

    #[async_trait]
    impl Sleeper for RecordingSleeper {
        async fn sleep(&self, duration: Duration) {
            self.delays.lock().unwrap().push(duration);
        }
    }

    impl RecordingSleeper {
        pub(crate) fn recorded(&self) -> Vec<Duration> {
            self.delays.lock().unwrap().clone()
        }
    }

    fn identity(s: &str) -> String {
        s.to_string()
    }

    #[tokio::test]
    async fn test_retries_429_with_linear_backoff() {
        let sleeper = RecordingSleeper::default();
        let calls = AtomicU32::new(0);
        let result = RetryPolicy::default()
            .run(
                &sleeper,
                |attempt| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async move {
                        if attempt < 3 {
                            Err(GroundError::http(429, "slow down"))
                        } else {
                            Ok("done")
                        }
                    }
                },
                identity,
            )
            .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(
            sleeper.recorded(),
            vec![Duration::from_secs(2), Duration::from_secs(4)]
        );
    }

    #[tokio::test]
    async fn test_gives_up_after_three_attempts() {
        let sleeper = RecordingSleeper::default();
        let calls = AtomicU32::new(0);
        let result: Result<()> = RetryPolicy::default()
            .run(
                &sleeper,
                |_| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err(GroundError::Transport("reset".into())) }
                },
                identity,
            )
            .await;

        assert!(matches!(result, Err(GroundError::Transport(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(sleeper.recorded().len(), 2);
    }

    #[tokio::test]
    async fn test_does_not_retry_client_or_server_errors() {
        for status in [400, 401, 404, 422, 500, 503] {
            let sleeper = RecordingSleeper::default();
            let calls = AtomicU32::new(0);
            let result: Result<()> = RetryPolicy::default()
                .run(
                    &sleeper,
                    |_| {
                        calls.fetch_add(1, Ordering::SeqCst);
                        async move { Err(GroundError::http(status, "no")) }
                    },
                    identity,
                )
                .await;

            assert_eq!(result.unwrap_err().status(), Some(status));
            assert_eq!(calls.load(Ordering::SeqCst), 1, "status {status}");
            assert!(sleeper.recorded().is_empty());
        }
    }

    #[tokio::test]
    async fn test_retries_403() {
        let sleeper = RecordingSleeper::default();
        let result = RetryPolicy::default()
            .run(
                &sleeper,
                |attempt| async move {
                    if attempt == 1 {
                        Err(GroundError::http(403, "blocked"))
                    } else {
                        Ok(attempt)
                    }
                },
                identity,
            )
            .await;
        assert_eq!(result.unwrap(), 2);
        assert_eq!(sleeper.recorded(), vec![Duration::from_secs(2)]);
    }
}
