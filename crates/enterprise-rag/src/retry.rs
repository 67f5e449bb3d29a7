//! Exponential backoff for calls to Ollama and the cloud emulator

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

use crate::error::{Error, Result};

/// Largest power of two applied to the base delay
const MAX_BACKOFF_EXPONENT: u32 = 10;

/// Why a single attempt failed
#[derive(Debug)]
pub enum Failure {
    /// Transport errors, 5xx and 429: worth another attempt
    Transient(Error),
    /// Anything else is returned immediately
    Fatal(Error),
}

impl Failure {
    /// Classify a non-success HTTP status
    pub fn for_status(status: reqwest::StatusCode, error: Error) -> Self {
        if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            Failure::Transient(error)
        } else {
            Failure::Fatal(error)
        }
    }
}

/// Bounded retry with doubling delays
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
}

impl RetryPolicy {
    /// At least one attempt is always made
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Total attempts, including the first
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay after the `attempt`-th failure (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(MAX_BACKOFF_EXPONENT);
        self.base_delay.saturating_mul(1u32 << exponent)
    }

    /// Run `operation` until it succeeds, fails fatally or runs out of attempts
    pub async fn run<F, Fut, T>(&self, service: &str, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, Failure>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match operation().await {
                Ok(value) => return Ok(value),
                Err(Failure::Fatal(e)) => return Err(e),
                Err(Failure::Transient(e)) if attempt >= self.max_attempts => return Err(e),
                Err(Failure::Transient(e)) => {
                    let delay = self.delay_for(attempt);
                    tracing::warn!(
                        "{} request failed (attempt {}/{}): {}, retrying in {:?}",
                        service,
                        attempt,
                        self.max_attempts,
                        e,
                        delay
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_delays_double_and_saturate() {
        let policy = RetryPolicy::new(3, Duration::from_millis(250));
        assert_eq!(policy.delay_for(1), Duration::from_millis(250));
        assert_eq!(policy.delay_for(2), Duration::from_millis(500));
        assert_eq!(policy.delay_for(3), Duration::from_secs(1));

        let capped = policy.delay_for(u32::MAX);
        assert_eq!(capped, Duration::from_millis(250 * 1024));
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts(), 1);
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let policy = RetryPolicy::new(3, Duration::from_millis(1));
        let result = policy
            .run("test", move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(Failure::Transient(Error::cloud("busy")))
                } else {
                    Ok(7)
                }
            })
            .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let policy = RetryPolicy::new(64, Duration::ZERO);
        let result: Result<()> = policy
            .run("test", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(Failure::Transient(Error::llm("down")))
            })
            .await;
        assert!(matches!(result, Err(Error::Llm(_))));
        assert_eq!(counter.load(Ordering::SeqCst), 64);
    }

    #[tokio::test]
    async fn test_fatal_failure_stops_immediately() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let policy = RetryPolicy::new(5, Duration::from_millis(1));
        let result: Result<()> = policy
            .run("test", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(Failure::Fatal(Error::validation("bad request")))
            })
            .await;
        assert!(matches!(result, Err(Error::Validation(_))));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
