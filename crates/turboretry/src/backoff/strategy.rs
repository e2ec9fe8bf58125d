//! Backoff strategies: how a base delay grows with the attempt index.

use crate::error::ConfigError;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Maps a base delay and a 1-based attempt index to the delay before the next attempt.
///
/// Implementations only describe *growth*. Capping and jitter are applied
/// afterwards by [`BackoffPolicy`](super::BackoffPolicy), so a strategy never
/// needs to know about limits or randomness.
///
/// # Contract
///
/// - `attempt` is the index of the attempt that just failed (1 for the first
///   failure). Callers never pass `0`, but built-in strategies treat it as `1`.
/// - The returned delay must saturate at [`Duration::MAX`] rather than wrap.
///
/// # Examples
///
/// A caller-defined strategy that grows by the square of the attempt:
///
/// ```rust
/// use turboretry::backoff::BackoffStrategy;
/// use std::time::Duration;
///
/// #[derive(Debug)]
/// struct Quadratic;
///
/// impl BackoffStrategy for Quadratic {
///     fn delay(&self, base: Duration, attempt: u32) -> Duration {
///         let factor = attempt.max(1).saturating_mul(attempt.max(1));
///         base.checked_mul(factor).unwrap_or(Duration::MAX)
///     }
/// }
///
/// assert_eq!(Quadratic.delay(Duration::from_millis(10), 3), Duration::from_millis(90));
/// ```
pub trait BackoffStrategy: fmt::Debug + Send + Sync {
    /// Compute the un-capped, un-jittered delay for `attempt`.
    fn delay(&self, base: Duration, attempt: u32) -> Duration;
}

impl<S: BackoffStrategy + ?Sized> BackoffStrategy for Arc<S> {
    fn delay(&self, base: Duration, attempt: u32) -> Duration {
        (**self).delay(base, attempt)
    }
}

impl<S: BackoffStrategy + ?Sized> BackoffStrategy for Box<S> {
    fn delay(&self, base: Duration, attempt: u32) -> Duration {
        (**self).delay(base, attempt)
    }
}

/// No growth: every retry waits `base`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Constant;

impl BackoffStrategy for Constant {
    fn delay(&self, base: Duration, _attempt: u32) -> Duration {
        base
    }
}

/// Doubling growth: `base * 2^(attempt - 1)`.
///
/// ```text
/// attempt 1 -> base
/// attempt 2 -> base * 2
/// attempt 3 -> base * 4
/// ```
///
/// Shifts past the width of `u32`, or products that do not fit in a
/// [`Duration`], saturate to [`Duration::MAX`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Exponential;

impl BackoffStrategy for Exponential {
    fn delay(&self, base: Duration, attempt: u32) -> Duration {
        if base.is_zero() {
            return Duration::ZERO;
        }
        let exponent = attempt.max(1) - 1;
        match 1u32.checked_shl(exponent) {
            Some(factor) => base.checked_mul(factor).unwrap_or(Duration::MAX),
            None => Duration::MAX,
        }
    }
}

/// Linear growth: `base * attempt`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Linear;

impl BackoffStrategy for Linear {
    fn delay(&self, base: Duration, attempt: u32) -> Duration {
        base.checked_mul(attempt.max(1)).unwrap_or(Duration::MAX)
    }
}

/// Adapter turning a closure `(base, attempt) -> Duration` into a strategy.
///
/// ```rust
/// use turboretry::backoff::{BackoffStrategy, CustomBackoff};
/// use std::time::Duration;
///
/// let fixed_step = CustomBackoff::new(|base, attempt| base + Duration::from_millis(5 * attempt as u64));
/// assert_eq!(fixed_step.delay(Duration::from_millis(100), 2), Duration::from_millis(110));
/// ```
#[derive(Clone)]
pub struct CustomBackoff<F> {
    func: F,
}

impl<F> CustomBackoff<F>
where
    F: Fn(Duration, u32) -> Duration + Send + Sync,
{
    /// Wrap `func` as a backoff strategy.
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F> fmt::Debug for CustomBackoff<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomBackoff").finish_non_exhaustive()
    }
}

impl<F> BackoffStrategy for CustomBackoff<F>
where
    F: Fn(Duration, u32) -> Duration + Send + Sync,
{
    fn delay(&self, base: Duration, attempt: u32) -> Duration {
        (self.func)(base, attempt)
    }
}

/// Named built-in strategies, used where a strategy has to be picked from text
/// (settings files, environment variables).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    /// See [`Constant`].
    #[default]
    Constant,
    /// See [`Linear`].
    Linear,
    /// See [`Exponential`].
    Exponential,
}

impl BackoffKind {
    /// The strategy object for this kind.
    pub fn strategy(self) -> Arc<dyn BackoffStrategy> {
        match self {
            BackoffKind::Constant => Arc::new(Constant),
            BackoffKind::Linear => Arc::new(Linear),
            BackoffKind::Exponential => Arc::new(Exponential),
        }
    }
}

impl fmt::Display for BackoffKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackoffKind::Constant => write!(f, "constant"),
            BackoffKind::Linear => write!(f, "linear"),
            BackoffKind::Exponential => write!(f, "exponential"),
        }
    }
}

impl FromStr for BackoffKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "constant" => Ok(BackoffKind::Constant),
            "linear" => Ok(BackoffKind::Linear),
            "exponential" => Ok(BackoffKind::Exponential),
            other => Err(ConfigError::UnknownStrategy(other.to_string())),
        }
    }
}
