//! What the retry driver returns when it gives up.

use std::time::Duration;

/// Why the driver stopped retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The error was classified as permanent; no retry was attempted for it.
    Permanent,
    /// The retry budget ran out while the error was still retryable.
    Exhausted,
}

/// Error returned when an operation could not be completed.
///
/// Carries the last error plus how long and how often the driver tried.
///
/// # Examples
///
/// ```rust
/// use larder::retry::{retry, RetryHint, Retryable, StopReason};
/// use larder::RetryPolicy;
/// use std::time::Duration;
///
/// #[derive(Debug)]
/// struct Flaky;
///
/// impl Retryable for Flaky {
///     fn retry_hint(&self) -> RetryHint {
///         RetryHint::Backoff
///     }
/// }
///
/// # tokio_test::block_on(async {
/// let policy = RetryPolicy::constant(Duration::from_millis(1)).with_max_retries(2);
/// let failure = retry(&policy, |_| async { Err::<(), _>(Flaky) })
///     .await
///     .unwrap_err();
///
/// assert_eq!(failure.attempts, 3); // 1 initial + 2 retries
/// assert_eq!(failure.reason, StopReason::Exhausted);
/// # });
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryFailure<E> {
    /// Error of the last attempt.
    pub final_error: E,
    /// Attempts made, the first one included.
    pub attempts: u32,
    /// Total time spent, including waits.
    pub total_duration: Duration,
    /// Whether the budget ran out or the error was permanent.
    pub reason: StopReason,
}

impl<E> RetryFailure<E> {
    /// Create a new RetryFailure.
    pub fn new(final_error: E, attempts: u32, total_duration: Duration, reason: StopReason) -> Self {
        Self {
            final_error,
            attempts,
            total_duration,
            reason,
        }
    }

    /// The last error, without the attempt metadata.
    pub fn into_error(self) -> E {
        self.final_error
    }

    /// Borrow the last error.
    pub fn error(&self) -> &E {
        &self.final_error
    }

    /// True when the retry budget ran out.
    pub fn is_exhausted(&self) -> bool {
        self.reason == StopReason::Exhausted
    }
}

impl<E: std::fmt::Display> std::fmt::Display for RetryFailure<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.reason {
            StopReason::Exhausted => write!(
                f,
                "gave up after {} attempts ({:?}): {}",
                self.attempts, self.total_duration, self.final_error
            ),
            StopReason::Permanent => write!(
                f,
                "permanent failure on attempt {}: {}",
                self.attempts, self.final_error
            ),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for RetryFailure<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.final_error)
    }
}
