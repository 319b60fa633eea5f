//! Integration tests for the retry driver.

use super::*;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
enum TestError {
    Transient,
    Permanent,
    SlowDown(Duration),
}

impl Retryable for TestError {
    fn retry_hint(&self) -> RetryHint {
        match self {
            TestError::Transient => RetryHint::Backoff,
            TestError::Permanent => RetryHint::Never,
            TestError::SlowDown(d) => RetryHint::After(*d),
        }
    }
}

#[tokio::test]
async fn test_retry_succeeds_on_third_attempt() {
    let attempts = Arc::new(AtomicU32::new(0));
    let policy = RetryPolicy::constant(Duration::from_millis(1)).with_max_retries(5);

    let result = retry(&policy, |_| {
        let attempts = attempts.clone();
        async move {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err(TestError::Transient)
            } else {
                Ok("success")
            }
        }
    })
    .await;

    assert_eq!(result, Ok("success"));
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_budget_bounds_total_attempts() {
    for budget in 0..5u32 {
        let attempts = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy::constant(Duration::from_millis(1)).with_max_retries(budget);

        let failure = retry(&policy, |_| {
            let attempts = attempts.clone();
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(TestError::Transient)
            }
        })
        .await
        .unwrap_err();

        assert_eq!(attempts.load(Ordering::SeqCst), budget + 1);
        assert_eq!(failure.attempts, budget + 1);
        assert_eq!(failure.reason, StopReason::Exhausted);
        assert_eq!(failure.final_error, TestError::Transient);
    }
}

#[tokio::test]
async fn test_permanent_error_consumes_no_retries() {
    let attempts = Arc::new(AtomicU32::new(0));
    let policy = RetryPolicy::constant(Duration::from_millis(1)).with_max_retries(5);

    let failure = retry(&policy, |_| {
        let attempts = attempts.clone();
        async move {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(TestError::Permanent)
        }
    })
    .await
    .unwrap_err();

    assert_eq!(attempts.load(Ordering::SeqCst), 1);
    assert_eq!(failure.reason, StopReason::Permanent);
}

#[tokio::test]
async fn test_permanent_error_after_transient_stops_immediately() {
    let policy = RetryPolicy::constant(Duration::from_millis(1)).with_max_retries(5);

    let failure = retry(&policy, |attempt| async move {
        if attempt == 0 {
            Err::<(), _>(TestError::Transient)
        } else {
            Err(TestError::Permanent)
        }
    })
    .await
    .unwrap_err();

    assert_eq!(failure.attempts, 2);
    assert_eq!(failure.final_error, TestError::Permanent);
}

#[tokio::test(start_paused = true)]
async fn test_exponential_waits_grow() {
    let policy = RetryPolicy::exponential(Duration::from_millis(1000)).with_max_retries(3);
    let mut delays = Vec::new();

    let _ = retry_with_hooks(
        &policy,
        |_| async { Err::<(), _>(TestError::Transient) },
        |event: &RetryEvent<'_, TestError>| delays.push(event.next_delay),
    )
    .await;

    assert_eq!(
        delays,
        vec![
            Some(Duration::from_millis(1000)),
            Some(Duration::from_millis(2000)),
            Some(Duration::from_millis(4000)),
            None,
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_jittered_waits_never_shrink() {
    // With 500ms of jitter on a 1s base, attempt i+1's minimum (2^(i+1)s)
    // is never below attempt i's maximum (2^i s + 0.5s).
    let policy = RetryPolicy::exponential(Duration::from_millis(1000))
        .with_additive_jitter(Duration::from_millis(500))
        .with_max_retries(3);
    let mut delays = Vec::new();

    let _ = retry_with_hooks(
        &policy,
        |_| async { Err::<(), _>(TestError::Transient) },
        |event: &RetryEvent<'_, TestError>| {
            if let Some(d) = event.next_delay {
                delays.push(d);
            }
        },
    )
    .await;

    assert_eq!(delays.len(), 3);
    assert!(delays.windows(2).all(|pair| pair[0] <= pair[1]));
}

#[tokio::test(start_paused = true)]
async fn test_server_declared_delay_overrides_backoff() {
    let policy = RetryPolicy::exponential(Duration::from_millis(100)).with_max_retries(2);
    let started = tokio::time::Instant::now();
    let mut seen = Vec::new();

    let result = retry(&policy, |attempt| {
        seen.push(tokio::time::Instant::now());
        async move {
            if attempt == 0 {
                Err(TestError::SlowDown(Duration::from_secs(3)))
            } else {
                Ok(())
            }
        }
    })
    .await;

    assert!(result.is_ok());
    assert_eq!(seen.len(), 2);
    assert!(seen[1].duration_since(started) >= Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn test_server_declared_delay_respects_cap() {
    let policy = RetryPolicy::exponential(Duration::from_millis(100))
        .with_max_retries(1)
        .with_max_delay(Duration::from_secs(60));
    let mut delays = Vec::new();

    let _ = retry_with_hooks(
        &policy,
        |_| async { Err::<(), _>(TestError::SlowDown(Duration::from_secs(600))) },
        |event: &RetryEvent<'_, TestError>| delays.push(event.next_delay),
    )
    .await;

    assert_eq!(delays, vec![Some(Duration::from_secs(60)), None]);
}

#[tokio::test(start_paused = true)]
async fn test_scaled_backoff_doubles_wait() {
    #[derive(Debug)]
    struct Throttled;

    impl Retryable for Throttled {
        fn retry_hint(&self) -> RetryHint {
            RetryHint::ScaledBackoff(2)
        }
    }

    let policy = RetryPolicy::exponential(Duration::from_millis(1000)).with_max_retries(2);
    let mut delays = Vec::new();

    let _ = retry_with_hooks(
        &policy,
        |_| async { Err::<(), _>(Throttled) },
        |event: &RetryEvent<'_, Throttled>| delays.push(event.next_delay),
    )
    .await;

    assert_eq!(
        delays,
        vec![
            Some(Duration::from_millis(2000)),
            Some(Duration::from_millis(4000)),
            None
        ]
    );
}

#[tokio::test]
async fn test_hook_reports_one_indexed_attempts() {
    let policy = RetryPolicy::constant(Duration::from_millis(1)).with_max_retries(2);
    let mut attempts = Vec::new();

    let _ = retry_with_hooks(
        &policy,
        |_| async { Err::<(), _>(TestError::Transient) },
        |event: &RetryEvent<'_, TestError>| attempts.push(event.attempt),
    )
    .await;

    assert_eq!(attempts, vec![1, 2, 3]);
}
