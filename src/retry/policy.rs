//! Budgets and delay schedules for the retry driver.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How many times to retry and how long to wait in between.
///
/// A policy only describes the schedule; the driver in [`crate::retry`]
/// performs the waits.
///
/// # Bounds Behavior
///
/// `max_retries` counts retries only, not the initial attempt: a budget of 3
/// allows up to 4 total attempts.
///
/// # Examples
///
/// ```rust
/// use larder::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::exponential(Duration::from_millis(1000))
///     .with_max_retries(2);
///
/// assert_eq!(policy.max_retries(), 2);
/// assert_eq!(policy.delay_for_attempt(0), Some(Duration::from_millis(1000)));
/// assert_eq!(policy.delay_for_attempt(1), Some(Duration::from_millis(2000)));
/// assert_eq!(policy.delay_for_attempt(2), None);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    strategy: RetryStrategy,
    max_retries: u32,
    #[serde(default)]
    max_delay: Option<Duration>,
    #[serde(default)]
    jitter: JitterStrategy,
}

/// Delay schedule before jitter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RetryStrategy {
    /// Same delay before every retry.
    Constant(Duration),
    /// `base * 2^attempt`.
    Exponential {
        /// Base delay duration.
        base: Duration,
    },
}

/// Random spread added on top of the schedule.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum JitterStrategy {
    /// Waits follow the schedule exactly.
    #[default]
    None,
    /// Add a uniformly random amount between zero and the given duration.
    Additive(Duration),
}

/// A failed attempt, as seen by a retry hook.
#[derive(Debug, Clone)]
pub struct RetryEvent<'a, E> {
    /// 1-indexed number of the failed attempt.
    pub attempt: u32,
    /// What it failed with.
    pub error: &'a E,
    /// Wait before the next attempt; `None` when giving up.
    pub next_delay: Option<Duration>,
    /// Time since the first attempt started.
    pub elapsed: Duration,
}

impl RetryPolicy {
    /// Policy waiting `delay` before every retry.
    ///
    /// The policy starts with a zero retry budget; set one with
    /// [`with_max_retries`](Self::with_max_retries).
    pub fn constant(delay: Duration) -> Self {
        Self {
            strategy: RetryStrategy::Constant(delay),
            max_retries: 0,
            max_delay: None,
            jitter: JitterStrategy::None,
        }
    }

    /// Policy doubling the wait after each retry, starting from `base`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use larder::RetryPolicy;
    /// use std::time::Duration;
    ///
    /// let policy = RetryPolicy::exponential(Duration::from_millis(100))
    ///     .with_max_retries(5);
    ///
    /// assert_eq!(policy.delay_for_attempt(0), Some(Duration::from_millis(100)));
    /// assert_eq!(policy.delay_for_attempt(1), Some(Duration::from_millis(200)));
    /// assert_eq!(policy.delay_for_attempt(2), Some(Duration::from_millis(400)));
    /// ```
    pub fn exponential(base: Duration) -> Self {
        Self {
            strategy: RetryStrategy::Exponential { base },
            max_retries: 0,
            max_delay: None,
            jitter: JitterStrategy::None,
        }
    }

    /// Set the retry budget; the first attempt is not counted.
    pub fn with_max_retries(mut self, n: u32) -> Self {
        self.max_retries = n;
        self
    }

    /// Cap every wait at `d`.
    ///
    /// Computed and server-declared delays never exceed this value.
    pub fn with_max_delay(mut self, d: Duration) -> Self {
        self.max_delay = Some(d);
        self
    }

    /// Add up to `max` of uniformly random delay to every wait.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use larder::RetryPolicy;
    /// use std::time::Duration;
    ///
    /// let policy = RetryPolicy::exponential(Duration::from_millis(1000))
    ///     .with_additive_jitter(Duration::from_millis(500))
    ///     .with_max_retries(3);
    ///
    /// let first = policy.delay_with_jitter(0).unwrap();
    /// assert!(first >= Duration::from_millis(1000));
    /// assert!(first <= Duration::from_millis(1500));
    /// ```
    pub fn with_additive_jitter(mut self, max: Duration) -> Self {
        self.jitter = JitterStrategy::Additive(max);
        self
    }

    /// Copy of this policy with a smaller retry budget.
    ///
    /// Used when part of a budget was already spent by earlier calls.
    pub fn with_budget_spent(&self, spent: u32) -> Self {
        let mut policy = self.clone();
        policy.max_retries = self.max_retries.saturating_sub(spent);
        policy
    }

    /// Copy of this policy with every base delay multiplied by `factor`.
    pub fn scaled(&self, factor: u32) -> Self {
        let mut policy = self.clone();
        policy.strategy = match &self.strategy {
            RetryStrategy::Constant(d) => RetryStrategy::Constant(d.saturating_mul(factor)),
            RetryStrategy::Exponential { base } => RetryStrategy::Exponential {
                base: base.saturating_mul(factor),
            },
        };
        policy
    }

    /// Retry budget.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Wait cap, if any.
    pub fn max_delay(&self) -> Option<Duration> {
        self.max_delay
    }

    /// Jitter applied to each wait.
    pub fn jitter(&self) -> &JitterStrategy {
        &self.jitter
    }

    /// Delay schedule.
    pub fn strategy(&self) -> &RetryStrategy {
        &self.strategy
    }

    /// Scheduled wait before retry `attempt` (0-indexed), without jitter;
    /// `None` once the budget is spent.
    pub fn delay_for_attempt(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_retries {
            return None;
        }

        let base_delay = match &self.strategy {
            RetryStrategy::Constant(d) => *d,
            RetryStrategy::Exponential { base } => {
                base.saturating_mul(2u32.saturating_pow(attempt))
            }
        };

        Some(self.cap(base_delay))
    }

    /// [`delay_for_attempt`](Self::delay_for_attempt) plus jitter, capped.
    pub fn delay_with_jitter(&self, attempt: u32) -> Option<Duration> {
        let base_delay = self.delay_for_attempt(attempt)?;
        Some(self.cap(self.jitter.apply(base_delay)))
    }

    /// Clamp a delay to `max_delay`, if one is set.
    pub fn cap(&self, delay: Duration) -> Duration {
        match self.max_delay {
            Some(max) => delay.min(max),
            None => delay,
        }
    }
}

impl JitterStrategy {
    /// Spread `base_delay` by this strategy.
    pub fn apply(&self, base_delay: Duration) -> Duration {
        match self {
            JitterStrategy::None => base_delay,
            JitterStrategy::Additive(max) => {
                use rand::Rng;
                let max_millis = max.as_millis() as u64;
                if max_millis == 0 {
                    return base_delay;
                }
                let extra = rand::rng().random_range(0..=max_millis);
                base_delay.saturating_add(Duration::from_millis(extra))
            }
        }
    }
}
