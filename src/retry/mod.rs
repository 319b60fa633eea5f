//! Backoff retry driver shared by every network client.
//!
//! A [`RetryPolicy`] is plain data; [`retry`] and [`retry_with_hooks`] run an
//! async operation under it in an explicit loop:
//!
//! - the error decides whether another attempt is allowed ([`Retryable`])
//! - retryable errors wait `base * 2^attempt + jitter`, or the delay the
//!   server asked for when the error carries one
//! - permanent errors surface on the attempt that produced them
//! - once the budget is spent the last error is returned to the caller
//!
//! Attempts of one operation never overlap: each waits for the previous one
//! to settle. Waits go through `tokio::time::sleep`, so they yield to other
//! tasks.
//!
//! # Quick Start
//!
//! ```rust
//! use larder::retry::{retry, RetryHint, Retryable};
//! use larder::RetryPolicy;
//! use std::time::Duration;
//!
//! #[derive(Debug)]
//! enum FetchError {
//!     Timeout,
//!     BadKey,
//! }
//!
//! impl Retryable for FetchError {
//!     fn retry_hint(&self) -> RetryHint {
//!         match self {
//!             FetchError::Timeout => RetryHint::Backoff,
//!             FetchError::BadKey => RetryHint::Never,
//!         }
//!     }
//! }
//!
//! # tokio_test::block_on(async {
//! let policy = RetryPolicy::constant(Duration::from_millis(1)).with_max_retries(3);
//!
//! let value = retry(&policy, |attempt| async move {
//!     if attempt < 2 {
//!         Err(FetchError::Timeout)
//!     } else {
//!         Ok(42)
//!     }
//! })
//! .await
//! .unwrap();
//!
//! assert_eq!(value, 42);
//! # });
//! ```

mod error;
mod policy;

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

pub use error::{RetryFailure, StopReason};
pub use policy::{JitterStrategy, RetryEvent, RetryPolicy, RetryStrategy};

/// How a failed attempt should be followed up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryHint {
    /// Do not retry; surface the error now.
    Never,
    /// Retry after the policy's backoff delay.
    Backoff,
    /// Retry after the policy's backoff delay with its base multiplied.
    ScaledBackoff(u32),
    /// Retry after exactly this delay (capped by the policy's `max_delay`).
    After(Duration),
}

/// Errors that know whether the operation producing them may be retried.
pub trait Retryable {
    /// Classify this error for the retry driver.
    fn retry_hint(&self) -> RetryHint;
}

/// Run `operation` under `policy`.
///
/// The closure receives the 0-indexed attempt number and must build a fresh
/// future each time. Failed attempts are logged at debug level.
pub async fn retry<T, E, F, Fut>(policy: &RetryPolicy, operation: F) -> Result<T, RetryFailure<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + std::fmt::Debug,
{
    retry_with_hooks(policy, operation, |event: &RetryEvent<'_, E>| {
        debug!(
            attempt = event.attempt,
            delay_ms = event.next_delay.map(|d| d.as_millis() as u64),
            error = ?event.error,
            "attempt failed"
        );
    })
    .await
}

/// Run `operation` under `policy`, calling `on_retry` after every failed
/// attempt.
///
/// The hook sees the failed attempt (1-indexed), the error, and the delay
/// before the next attempt (`None` when the driver is about to give up).
pub async fn retry_with_hooks<T, E, F, Fut, H>(
    policy: &RetryPolicy,
    mut operation: F,
    mut on_retry: H,
) -> Result<T, RetryFailure<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable,
    H: FnMut(&RetryEvent<'_, E>),
{
    let start = Instant::now();
    let mut attempt = 0u32;

    loop {
        let error = match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };

        let hint = error.retry_hint();
        let delay = next_delay(policy, hint, attempt);

        on_retry(&RetryEvent {
            attempt: attempt + 1,
            error: &error,
            next_delay: delay,
            elapsed: start.elapsed(),
        });

        match delay {
            Some(d) => {
                tokio::time::sleep(d).await;
                attempt += 1;
            }
            None => {
                let reason = if hint == RetryHint::Never {
                    StopReason::Permanent
                } else {
                    StopReason::Exhausted
                };
                return Err(RetryFailure::new(
                    error,
                    attempt + 1,
                    start.elapsed(),
                    reason,
                ));
            }
        }
    }
}

fn next_delay(policy: &RetryPolicy, hint: RetryHint, attempt: u32) -> Option<Duration> {
    match hint {
        RetryHint::Never => None,
        RetryHint::Backoff => policy.delay_with_jitter(attempt),
        RetryHint::ScaledBackoff(factor) => policy.scaled(factor).delay_with_jitter(attempt),
        RetryHint::After(requested) => policy
            .delay_for_attempt(attempt)
            .map(|_| policy.cap(requested)),
    }
}

#[cfg(test)]
mod tests;
