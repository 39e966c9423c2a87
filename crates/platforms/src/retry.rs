// Bounded retry-with-delay for async operations.
//
// Fixed delay between attempts; the operation learns whether it is running its
// final attempt so it can stop suppressing errors.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::ResolverError;

/// Configuration for retry behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one.
    pub max_retry_count: u32,
    /// Fixed delay between two attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retry_count: 3,
            delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retry_count: u32, delay: Duration) -> Self {
        Self {
            max_retry_count,
            delay,
        }
    }

    fn attempts(&self) -> u32 {
        self.max_retry_count.max(1)
    }
}

/// Passed to the operation on every attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryAttempt {
    /// 1-based attempt number.
    pub number: u32,
    pub is_last: bool,
}

/// Runs `operation` until it succeeds or the policy is exhausted.
///
/// When every attempt fails the error of the last attempt is returned.
pub async fn retry<F, Fut, T, E>(policy: &RetryPolicy, mut operation: F) -> Result<T, E>
where
    F: FnMut(RetryAttempt) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let attempts = policy.attempts();
    let mut number = 1;
    loop {
        let attempt = RetryAttempt {
            number,
            is_last: number == attempts,
        };
        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) if attempt.is_last => return Err(err),
            Err(err) => {
                warn!(
                    attempt = number,
                    max = attempts,
                    delay_ms = policy.delay.as_millis() as u64,
                    error = %err,
                    "Attempt failed, retrying"
                );
                tokio::time::sleep(policy.delay).await;
            }
        }
        number += 1;
    }
}

/// Like [`retry`], but gives up early once `token` is cancelled.
pub async fn retry_cancellable<F, Fut, T>(
    policy: &RetryPolicy,
    token: &CancellationToken,
    mut operation: F,
) -> Result<T, ResolverError>
where
    F: FnMut(RetryAttempt) -> Fut,
    Fut: Future<Output = Result<T, ResolverError>>,
{
    let attempts = policy.attempts();
    for number in 1..=attempts {
        if token.is_cancelled() {
            return Err(ResolverError::Cancelled);
        }

        let attempt = RetryAttempt {
            number,
            is_last: number == attempts,
        };
        let result = tokio::select! {
            _ = token.cancelled() => return Err(ResolverError::Cancelled),
            result = operation(attempt) => result,
        };

        match result {
            Ok(value) => return Ok(value),
            Err(err) if attempt.is_last => return Err(err),
            Err(err) => {
                warn!(
                    attempt = number,
                    max = attempts,
                    error = %err,
                    "Attempt failed, retrying"
                );
                tokio::select! {
                    _ = token.cancelled() => return Err(ResolverError::Cancelled),
                    _ = tokio::time::sleep(policy.delay) => {}
                }
            }
        }
    }

    // Unreachable: the last iteration always returns.
    Err(ResolverError::Cancelled)
}
