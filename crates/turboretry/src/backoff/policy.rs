//! Delay computation: strategy, then cap, then jitter.

use super::strategy::{BackoffStrategy, Constant};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;

/// Compute the delay before the attempt following `attempt`.
///
/// # Formula
///
/// ```text
/// raw     = strategy(base, attempt)
/// capped  = min(raw, limit)            if limit is set and > 0
/// final   = capped + uniform[0, max_jitter]   if max_jitter is set and > 0
/// ```
///
/// The final delay is **not** clamped against `limit` a second time: jitter
/// can push it up to `limit + max_jitter`. Every step saturates at
/// [`Duration::MAX`].
///
/// # Examples
///
/// ```rust
/// use turboretry::backoff::{compute_delay, Exponential};
/// use rand::SeedableRng;
/// use std::time::Duration;
///
/// let mut rng = rand::rngs::StdRng::seed_from_u64(7);
/// let delay = compute_delay(
///     Duration::from_millis(100),
///     3,
///     &Exponential,
///     Some(Duration::from_millis(250)),
///     None,
///     &mut rng,
/// );
/// assert_eq!(delay, Duration::from_millis(250));
/// ```
pub fn compute_delay<S, R>(
    base: Duration,
    attempt: u32,
    strategy: &S,
    limit: Option<Duration>,
    max_jitter: Option<Duration>,
    rng: &mut R,
) -> Duration
where
    S: BackoffStrategy + ?Sized,
    R: Rng,
{
    let capped = cap(strategy.delay(base, attempt), limit);
    capped.saturating_add(jitter(max_jitter, rng))
}

fn cap(delay: Duration, limit: Option<Duration>) -> Duration {
    match limit {
        Some(limit) if !limit.is_zero() => delay.min(limit),
        _ => delay,
    }
}

/// Uniform sample from `[0, max_jitter]` at nanosecond resolution.
fn jitter<R: Rng>(max_jitter: Option<Duration>, rng: &mut R) -> Duration {
    match max_jitter {
        Some(max) if !max.is_zero() => {
            let max_nanos = u64::try_from(max.as_nanos()).unwrap_or(u64::MAX);
            Duration::from_nanos(rng.gen_range(0..=max_nanos))
        }
        _ => Duration::ZERO,
    }
}

/// The backoff half of a retry configuration.
///
/// Bundles the base delay, the growth strategy, the optional cap and the
/// optional jitter so the executor only has to ask "how long before the next
/// attempt?".
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    base: Duration,
    strategy: Arc<dyn BackoffStrategy>,
    limit: Option<Duration>,
    max_jitter: Option<Duration>,
}

impl Default for BackoffPolicy {
    /// One second, constant, no cap, no jitter.
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            strategy: Arc::new(Constant),
            limit: None,
            max_jitter: None,
        }
    }
}

impl BackoffPolicy {
    /// Create a policy. Zero `limit` or zero `max_jitter` are stored as `None`.
    pub fn new(
        base: Duration,
        strategy: Arc<dyn BackoffStrategy>,
        limit: Option<Duration>,
        max_jitter: Option<Duration>,
    ) -> Self {
        Self {
            base,
            strategy,
            limit: limit.filter(|d| !d.is_zero()),
            max_jitter: max_jitter.filter(|d| !d.is_zero()),
        }
    }

    /// Base delay fed to the strategy.
    pub fn base(&self) -> Duration {
        self.base
    }

    /// Growth strategy.
    pub fn strategy(&self) -> &Arc<dyn BackoffStrategy> {
        &self.strategy
    }

    /// Cap applied before jitter, if any.
    pub fn limit(&self) -> Option<Duration> {
        self.limit
    }

    /// Upper bound of the jitter added after capping, if any.
    pub fn max_jitter(&self) -> Option<Duration> {
        self.max_jitter
    }

    /// Strategy output clamped to the limit, without jitter.
    pub fn capped_delay(&self, attempt: u32) -> Duration {
        cap(self.strategy.delay(self.base, attempt), self.limit)
    }

    /// Full delay for `attempt` using the thread-local RNG for jitter.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.delay_with_rng(attempt, &mut rand::thread_rng())
    }

    /// Full delay for `attempt` drawing jitter from `rng`.
    pub fn delay_with_rng<R: Rng>(&self, attempt: u32, rng: &mut R) -> Duration {
        compute_delay(
            self.base,
            attempt,
            self.strategy.as_ref(),
            self.limit,
            self.max_jitter,
            rng,
        )
    }
}
