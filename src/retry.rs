//! Retry utilities with exponential backoff and jitter.
//!
//! Writes to a ConsulACL (finalizer and status) are optimistic: they carry the
//! resourceVersion they were computed from and the API server rejects them
//! with 409 if someone else wrote in between. Those conflicts are retried here
//! with a small fixed budget; every other error is returned immediately.
//!
//! # Example
//!
//! ```ignore
//! use consul_acl_operator::retry::retry_on_conflict;
//!
//! retry_on_conflict("patch_status", || async {
//!     let latest = api.get(&name).await?;
//!     patch_with_version(&api, &latest).await
//! })
//! .await?;
//! ```

use std::time::Duration;

use rand::Rng;
use tracing::{debug, warn};

use crate::Error;

/// Backoff settings for a retried operation
#[derive(Clone, Debug)]
pub struct RetryConfig {
    /// Attempts including the first; at least one is always made
    pub max_attempts: u32,
    /// Delay before the second attempt
    pub initial_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
    /// Growth factor between delays
    pub backoff_multiplier: f64,
}

impl RetryConfig {
    /// Budget for resourceVersion conflicts on a single object
    pub fn conflict() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(1),
            backoff_multiplier: 2.0,
        }
    }

    fn next_delay(&self, delay: Duration) -> Duration {
        delay.mul_f64(self.backoff_multiplier).min(self.max_delay)
    }
}

/// Run `operation` until it succeeds, fails with an error `should_retry`
/// rejects, or `max_attempts` is used up. The last error is returned.
pub async fn retry_with_backoff<F, Fut, T, E, P>(
    config: &RetryConfig,
    operation_name: &str,
    should_retry: P,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let attempts = config.max_attempts.max(1);
    let mut delay = config.initial_delay;
    let mut attempt = 1;

    loop {
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };
        if !should_retry(&err) || attempt == attempts {
            if attempt > 1 {
                warn!(operation = %operation_name, attempts = attempt, error = %err, "giving up");
            }
            return Err(err);
        }

        // 0.5x to 1.5x jitter so racing writers spread out
        let pause = delay.mul_f64(rand::thread_rng().gen_range(0.5..1.5));
        debug!(
            operation = %operation_name,
            attempt,
            error = %err,
            delay_ms = pause.as_millis() as u64,
            "retrying"
        );
        tokio::time::sleep(pause).await;

        delay = config.next_delay(delay);
        attempt += 1;
    }
}

/// Re-run `operation` while it fails with a resourceVersion conflict
pub async fn retry_on_conflict<F, Fut, T>(operation_name: &str, operation: F) -> Result<T, Error>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, Error>>,
{
    retry_with_backoff(
        &RetryConfig::conflict(),
        operation_name,
        Error::is_conflict,
        operation,
    )
    .await
}
