//! Exponential-backoff retry wrapper for provider calls.
//!
//! Distinguishes transient from permanent failures: transport errors and an
//! allow-list of HTTP status codes are retried with exponential backoff,
//! everything else aborts immediately. Every retry and abort is logged.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Status codes retried by default: request timeout, too many requests, and
/// the transient 5xx family.
pub const DEFAULT_RETRY_STATUSES: [u16; 6] = [408, 429, 500, 502, 503, 504];

/// Backoff policy wrapping a single provider call.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Number of retries after the initial attempt.
    pub retries: u32,
    /// Delay before the first retry.
    pub min_timeout: Duration,
    /// Ceiling on the backoff delay.
    pub max_timeout: Duration,
    /// Multiplier applied per attempt.
    pub factor: f64,
    /// HTTP status codes considered transient.
    pub retry_statuses: Vec<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 3,
            min_timeout: Duration::from_millis(250),
            max_timeout: Duration::from_secs(10),
            factor: 2.0,
            retry_statuses: DEFAULT_RETRY_STATUSES.to_vec(),
        }
    }
}

impl RetryPolicy {
    /// Whether `err` is worth another attempt under this policy.
    fn is_retryable(&self, err: &Error) -> bool {
        match err {
            Error::Transport(_) => true,
            Error::Http { status, .. } => self.retry_statuses.contains(status),
            _ => false,
        }
    }

    /// Backoff delay for the given zero-based attempt:
    /// `min(min_timeout * factor^attempt, max_timeout)`.
    fn delay(&self, attempt: u32) -> Duration {
        let millis = self.min_timeout.as_millis() as f64 * self.factor.powi(attempt as i32);
        Duration::from_millis(millis.min(self.max_timeout.as_millis() as f64) as u64)
    }

    /// Run `f`, retrying transient failures with exponential backoff.
    ///
    /// Errors without a retryable status abort on the first failure and
    /// propagate as permanent. Once `retries` is exhausted the last error is
    /// propagated.
    pub async fn run<T, F, Fut>(&self, op: &str, mut f: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0u32;
        loop {
            match f().await {
                Ok(value) => return Ok(value),
                Err(err) if attempt < self.retries && self.is_retryable(&err) => {
                    let wait = self.delay(attempt);
                    attempt += 1;
                    warn!(
                        op,
                        attempt,
                        wait_ms = wait.as_millis() as u64,
                        error = %err,
                        "transient failure, backing off before retry"
                    );
                    tokio::time::sleep(wait).await;
                }
                Err(err) => {
                    if self.is_retryable(&err) {
                        warn!(op, attempts = attempt + 1, error = %err, "retries exhausted");
                    } else {
                        debug!(op, error = %err, "permanent failure, not retrying");
                    }
                    return Err(err);
                }
            }
        }
    }
}
