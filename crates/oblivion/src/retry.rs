//! Caller-side retries for transient service failures.
//!
//! Nothing inside the registry retries on its own. Clients wrap individual
//! encryption service calls in a [`RetryPolicy`], which repeats a call only
//! while it fails with a retryable error.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::{OblivionError, Result};

/// Exponential backoff for retryable failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Zero behaves as one.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_backoff: Duration,
    /// Upper bound on any single delay.
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay before retry number `retry` (1-based).
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry.saturating_sub(1)).unwrap_or(u32::MAX);
        self.initial_backoff
            .checked_mul(factor)
            .map_or(self.max_backoff, |d| d.min(self.max_backoff))
    }

    /// How long to wait before retrying after `attempt` (1-based) failed with
    /// `err`, or `None` if the failure is final.
    pub fn next_delay(&self, attempt: u32, err: &OblivionError) -> Option<Duration> {
        if !err.is_retryable() || attempt >= self.max_attempts.max(1) {
            return None;
        }
        let delay = self.backoff(attempt);
        warn!(attempt, ?delay, error = %err, "retrying after transient failure");
        Some(delay)
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// attempts run out. The last error is returned.
    pub async fn run<F, Fut, T>(&self, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1;

        loop {
            match op().await {
                Err(e) => match self.next_delay(attempt, &e) {
                    Some(delay) => {
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                    None => return Err(e),
                },
                ok => return ok,
            }
        }
    }
}
