//! Fixed-delay retry
//!
//! Deployment creation, health polls, telemetry reads and the first page of
//! a log scroll all go through [`RetryExecutor`]: up to `max_retries` more
//! tries after the first, with the same pause before each one.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Tries after the first one
    pub max_retries: u32,

    #[serde(with = "humantime_serde")]
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(5))
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, delay: Duration) -> Self {
        Self { max_retries, delay }
    }

    /// A single try
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

/// The operation failed on every try
#[derive(Debug, thiserror::Error)]
#[error("{label}: failed after {attempts} attempt(s): {last_error}")]
pub struct RetryError<E> {
    pub label: String,
    pub attempts: u32,
    /// Failure of the final try
    pub last_error: E,
}

impl<E> RetryError<E> {
    pub fn into_inner(self) -> E {
        self.last_error
    }
}

/// Runs fallible async operations under a [`RetryPolicy`]
#[derive(Debug, Clone, Default)]
pub struct RetryExecutor {
    policy: RetryPolicy,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Call `op` until it succeeds or the policy is spent.
    ///
    /// `label` reads as a phrase ("creating deployment x") and prefixes both
    /// the log lines and the returned error.
    pub async fn execute<F, Fut, T, E>(&self, label: &str, mut op: F) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let max_attempts = self.policy.max_attempts();
        let mut attempt = 1;

        loop {
            let error = match op().await {
                Ok(value) => {
                    if attempt > 1 {
                        info!("{}: ok on attempt {}", label, attempt);
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };

            if attempt == max_attempts {
                warn!("error {}, giving up after {} attempt(s): {}", label, attempt, error);
                return Err(RetryError {
                    label: label.to_string(),
                    attempts: attempt,
                    last_error: error,
                });
            }

            warn!(
                "error {}, retrying in {:?} ({} of {} attempts used): {}",
                label, self.policy.delay, attempt, max_attempts, error
            );
            tokio::time::sleep(self.policy.delay).await;
            attempt += 1;
            debug!("{}: attempt {}", label, attempt);
        }
    }
}
