//! Exponential backoff retry policy
//!
//! A guarded call moves through `attempt -> success`, `attempt -> retryable
//! failure -> sleep -> attempt`, or `attempt -> fatal failure`. At most
//! `max_retries` retries follow the first attempt.

use spendlens_core::error::{ErrorKind, Result};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Decides whether a classified failure is worth another attempt
pub type RetryPredicate = fn(ErrorKind) -> bool;

/// Retry configuration applied around a fallible async call
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
    /// Kinds for which a retry is attempted
    pub retryable: RetryPredicate,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            retryable: ErrorKind::is_transient,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay,
            ..Self::default()
        }
    }

    /// Policy that gives up after the first failure
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn with_retryable(mut self, retryable: RetryPredicate) -> Self {
        self.retryable = retryable;
        self
    }

    /// Delay slept before retry number `attempt + 1`
    ///
    /// `min(base_delay * 2^attempt, max_delay)`, saturating on overflow.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        2u32.checked_pow(attempt)
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }

    /// Whether a failure of `kind` after `attempt` retries gets another try
    pub fn should_retry(&self, kind: ErrorKind, attempt: u32) -> bool {
        attempt < self.max_retries && (self.retryable)(kind)
    }

    /// Run `call` until it succeeds, fails fatally, or retries run out
    ///
    /// Errors without an [`ErrorKind`] are never retried.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            let error = match call().await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(operation, retries = attempt, "Call succeeded after retrying");
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };

            let Some(kind) = error.kind() else {
                return Err(error);
            };

            if !self.should_retry(kind, attempt) {
                if (self.retryable)(kind) && attempt > 0 {
                    warn!(operation, %kind, retries = attempt, "Giving up after retries");
                }
                return Err(error);
            }

            let delay = self.delay_for(attempt);
            warn!(
                operation,
                %kind,
                attempt = attempt + 1,
                max_retries = self.max_retries,
                delay_ms = delay.as_millis() as u64,
                "Transient failure, retrying"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}
