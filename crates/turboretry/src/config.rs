//! Retry configuration.
//!
//! A [`RetryConfig`] is built once, through [`RetryConfig::builder`] or from
//! external [`RetrySettings`], and is read-only afterwards. It is cheap to
//! clone and can be shared by any number of concurrent retry runs.

use crate::backoff::{BackoffKind, BackoffPolicy, BackoffStrategy, Constant, CustomBackoff};
use crate::cancel::CancelSignal;
use crate::error::{ConfigError, Result};
use serde::Deserialize;
use std::error::Error;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Callback invoked after a retryable failure, before the wait.
pub type OnRetry = Arc<dyn Fn(u32, &(dyn Error + 'static)) + Send + Sync>;

/// Predicate deciding whether an error deserves another attempt.
pub type RetryIf = Arc<dyn Fn(&(dyn Error + 'static)) -> bool + Send + Sync>;

const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_BASE_BACKOFF: Duration = Duration::from_secs(1);

/// Configuration for one retry policy.
///
/// # Defaults
///
/// - `max_retries`: 3 (four attempts in total)
/// - `base_backoff`: 1s
/// - `backoff_strategy`: constant
/// - `backoff_limit`: none
/// - `max_jitter`: none
/// - `retry_if`: every error is retryable
/// - `on_retry`: none
/// - `cancellation`: never cancels
#[derive(Clone)]
pub struct RetryConfig {
    max_retries: u32,
    backoff: BackoffPolicy,
    on_retry: Option<OnRetry>,
    retry_if: Option<RetryIf>,
    cancellation: Option<Arc<dyn CancelSignal>>,
    operation_name: Option<Arc<str>>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            backoff: BackoffPolicy::default(),
            on_retry: None,
            retry_if: None,
            cancellation: None,
            operation_name: None,
        }
    }
}

impl fmt::Debug for RetryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryConfig")
            .field("max_retries", &self.max_retries)
            .field("backoff", &self.backoff)
            .field("on_retry", &self.on_retry.is_some())
            .field("retry_if", &self.retry_if.is_some())
            .field("cancellation", &self.cancellation)
            .field("operation_name", &self.operation_name)
            .finish()
    }
}

impl RetryConfig {
    /// Create a new builder starting from the defaults.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use turboretry::RetryConfig;
    /// use std::time::Duration;
    ///
    /// let config = RetryConfig::builder()
    ///     .max_retries(5)
    ///     .base_backoff(Duration::from_millis(100))
    ///     .exponential_backoff()
    ///     .backoff_limit(Duration::from_secs(10))
    ///     .max_jitter(Duration::from_millis(50))
    ///     .build();
    ///
    /// assert_eq!(config.max_retries(), 5);
    /// ```
    pub fn builder() -> RetryConfigBuilder {
        RetryConfigBuilder::default()
    }

    /// Additional attempts allowed after the first one.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Total attempts allowed, `1 + max_retries` (saturating).
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Backoff policy used between attempts.
    pub fn backoff(&self) -> &BackoffPolicy {
        &self.backoff
    }

    /// Signal stored in the configuration, if any.
    pub fn cancellation(&self) -> Option<&Arc<dyn CancelSignal>> {
        self.cancellation.as_ref()
    }

    /// Label attached to log events.
    pub fn operation_name(&self) -> Option<&str> {
        self.operation_name.as_deref()
    }

    /// Whether `error` should be retried. Defaults to `true`.
    pub fn is_retryable(&self, error: &(dyn Error + 'static)) -> bool {
        self.retry_if.as_ref().is_none_or(|predicate| predicate(error))
    }

    pub(crate) fn notify_retry(&self, attempt: u32, error: &(dyn Error + 'static)) {
        if let Some(on_retry) = &self.on_retry {
            on_retry(attempt, error);
        }
    }
}

/// Builder for [`RetryConfig`].
///
/// Every setter overrides exactly one field; unset fields keep the defaults
/// documented on [`RetryConfig`].
#[derive(Default)]
pub struct RetryConfigBuilder {
    max_retries: Option<u32>,
    base_backoff: Option<Duration>,
    strategy: Option<Arc<dyn BackoffStrategy>>,
    backoff_limit: Option<Duration>,
    max_jitter: Option<Duration>,
    on_retry: Option<OnRetry>,
    retry_if: Option<RetryIf>,
    cancellation: Option<Arc<dyn CancelSignal>>,
    operation_name: Option<Arc<str>>,
}

impl fmt::Debug for RetryConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryConfigBuilder")
            .field("max_retries", &self.max_retries)
            .field("base_backoff", &self.base_backoff)
            .field("strategy", &self.strategy)
            .field("backoff_limit", &self.backoff_limit)
            .field("max_jitter", &self.max_jitter)
            .field("operation_name", &self.operation_name)
            .finish_non_exhaustive()
    }
}

impl RetryConfigBuilder {
    /// Set the number of retries after the first attempt.
    ///
    /// Default: 3
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Set the base delay fed to the backoff strategy.
    ///
    /// Default: 1s
    pub fn base_backoff(mut self, base: Duration) -> Self {
        self.base_backoff = Some(base);
        self
    }

    /// Use an arbitrary backoff strategy.
    pub fn backoff_strategy(mut self, strategy: impl BackoffStrategy + 'static) -> Self {
        self.strategy = Some(Arc::new(strategy));
        self
    }

    /// Use one of the named built-in strategies.
    pub fn backoff_kind(mut self, kind: BackoffKind) -> Self {
        self.strategy = Some(kind.strategy());
        self
    }

    /// Wait `base` before every retry.
    pub fn constant_backoff(self) -> Self {
        self.backoff_strategy(Constant)
    }

    /// Wait `base * attempt` before retry number `attempt`.
    pub fn linear_backoff(self) -> Self {
        self.backoff_kind(BackoffKind::Linear)
    }

    /// Wait `base * 2^(attempt - 1)` before retry number `attempt`.
    pub fn exponential_backoff(self) -> Self {
        self.backoff_kind(BackoffKind::Exponential)
    }

    /// Compute delays with a closure of `(base, attempt)`.
    ///
    /// ```rust
    /// use turboretry::RetryConfig;
    /// use std::time::Duration;
    ///
    /// let config = RetryConfig::builder()
    ///     .base_backoff(Duration::from_millis(10))
    ///     .custom_backoff(|base, attempt| base * (attempt + 1))
    ///     .build();
    ///
    /// assert_eq!(config.backoff().capped_delay(2), Duration::from_millis(30));
    /// ```
    pub fn custom_backoff<F>(self, func: F) -> Self
    where
        F: Fn(Duration, u32) -> Duration + Send + Sync + 'static,
    {
        self.backoff_strategy(CustomBackoff::new(func))
    }

    /// Cap every strategy output before jitter. `Duration::ZERO` removes the cap.
    pub fn backoff_limit(mut self, limit: Duration) -> Self {
        self.backoff_limit = Some(limit);
        self
    }

    /// Add a uniform random delay in `[0, max_jitter]` after capping.
    pub fn max_jitter(mut self, max_jitter: Duration) -> Self {
        self.max_jitter = Some(max_jitter);
        self
    }

    /// Invoke `callback(attempt, error)` after each retryable failure, before waiting.
    pub fn on_retry<F>(mut self, callback: F) -> Self
    where
        F: Fn(u32, &(dyn Error + 'static)) + Send + Sync + 'static,
    {
        self.on_retry = Some(Arc::new(callback));
        self
    }

    /// Only retry errors for which `predicate` returns `true`.
    ///
    /// The error is passed as a trait object, so predicates can downcast to
    /// the concrete type:
    ///
    /// ```rust
    /// use turboretry::RetryConfig;
    /// use std::io;
    ///
    /// let config = RetryConfig::builder()
    ///     .retry_if(|err| {
    ///         err.downcast_ref::<io::Error>()
    ///             .is_some_and(|e| e.kind() == io::ErrorKind::TimedOut)
    ///     })
    ///     .build();
    ///
    /// assert!(config.is_retryable(&io::Error::from(io::ErrorKind::TimedOut)));
    /// assert!(!config.is_retryable(&io::Error::from(io::ErrorKind::NotFound)));
    /// ```
    pub fn retry_if<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&(dyn Error + 'static)) -> bool + Send + Sync + 'static,
    {
        self.retry_if = Some(Arc::new(predicate));
        self
    }

    /// Stop retrying when `signal` fires.
    pub fn cancellation(mut self, signal: impl CancelSignal + 'static) -> Self {
        self.cancellation = Some(Arc::new(signal));
        self
    }

    /// Label log events emitted for this policy.
    pub fn operation_name(mut self, name: impl Into<Arc<str>>) -> Self {
        self.operation_name = Some(name.into());
        self
    }

    /// Build the configuration, filling unset fields with defaults.
    pub fn build(self) -> RetryConfig {
        RetryConfig {
            max_retries: self.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
            backoff: BackoffPolicy::new(
                self.base_backoff.unwrap_or(DEFAULT_BASE_BACKOFF),
                self.strategy.unwrap_or_else(|| Arc::new(Constant)),
                self.backoff_limit,
                self.max_jitter,
            ),
            on_retry: self.on_retry,
            retry_if: self.retry_if,
            cancellation: self.cancellation,
            operation_name: self.operation_name,
        }
    }
}

/// Retry settings in a plain, serializable shape.
///
/// Durations are whole milliseconds and counts are signed so that bad input
/// from files or the environment is rejected with a [`ConfigError`] instead of
/// failing to parse.
///
/// ```rust
/// use turboretry::config::RetrySettings;
///
/// let settings: RetrySettings = serde_json::from_str(
///     r#"{ "max_retries": 2, "base_backoff_ms": 100, "backoff_strategy": "exponential" }"#,
/// ).unwrap();
/// let config = settings.into_config().unwrap().build();
/// assert_eq!(config.max_retries(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetrySettings {
    /// Retries after the first attempt.
    pub max_retries: Option<i64>,
    /// Base delay in milliseconds.
    pub base_backoff_ms: Option<i64>,
    /// Growth strategy.
    pub backoff_strategy: Option<BackoffKind>,
    /// Cap in milliseconds; `0` means no cap.
    pub backoff_limit_ms: Option<i64>,
    /// Jitter upper bound in milliseconds; `0` means no jitter.
    pub max_jitter_ms: Option<i64>,
}

impl RetrySettings {
    /// Validate the settings and turn them into a builder.
    ///
    /// The builder can still be extended with callbacks, predicates and a
    /// cancellation signal, which have no textual representation.
    pub fn into_config(self) -> Result<RetryConfigBuilder> {
        let mut builder = RetryConfig::builder();

        if let Some(retries) = self.max_retries {
            let retries = u32::try_from(retries).map_err(|_| ConfigError::Invalid {
                field: "max_retries",
                reason: format!("must be between 0 and {} (got {retries})", u32::MAX),
            })?;
            builder = builder.max_retries(retries);
        }
        if let Some(ms) = self.base_backoff_ms {
            builder = builder.base_backoff(millis("base_backoff_ms", ms)?);
        }
        if let Some(kind) = self.backoff_strategy {
            builder = builder.backoff_kind(kind);
        }
        if let Some(ms) = self.backoff_limit_ms {
            builder = builder.backoff_limit(millis("backoff_limit_ms", ms)?);
        }
        if let Some(ms) = self.max_jitter_ms {
            builder = builder.max_jitter(millis("max_jitter_ms", ms)?);
        }

        Ok(builder)
    }

    /// Read settings from environment variables.
    ///
    /// This will look for:
    /// - `TURBORETRY_MAX_RETRIES`
    /// - `TURBORETRY_BASE_BACKOFF_MS`
    /// - `TURBORETRY_BACKOFF_STRATEGY` (`constant`, `linear` or `exponential`)
    /// - `TURBORETRY_BACKOFF_LIMIT_MS`
    /// - `TURBORETRY_MAX_JITTER_MS`
    ///
    /// Unset variables stay `None`; values that do not parse are an error.
    #[cfg(feature = "env")]
    pub fn from_env() -> Result<Self> {
        use std::env;

        fn number(var: &str) -> Result<Option<i64>> {
            match env::var(var) {
                Ok(value) => value
                    .trim()
                    .parse::<i64>()
                    .map(Some)
                    .map_err(|_| ConfigError::Env {
                        var: var.to_string(),
                        value,
                    }),
                Err(_) => Ok(None),
            }
        }

        let backoff_strategy = match env::var("TURBORETRY_BACKOFF_STRATEGY") {
            Ok(value) => Some(value.parse::<BackoffKind>()?),
            Err(_) => None,
        };

        Ok(Self {
            max_retries: number("TURBORETRY_MAX_RETRIES")?,
            base_backoff_ms: number("TURBORETRY_BASE_BACKOFF_MS")?,
            backoff_strategy,
            backoff_limit_ms: number("TURBORETRY_BACKOFF_LIMIT_MS")?,
            max_jitter_ms: number("TURBORETRY_MAX_JITTER_MS")?,
        })
    }
}

fn millis(field: &'static str, ms: i64) -> Result<Duration> {
    u64::try_from(ms)
        .map(Duration::from_millis)
        .map_err(|_| ConfigError::Invalid {
            field,
            reason: format!("must not be negative (got {ms})"),
        })
}
