//! Error types for retry execution and configuration.
//!
//! [`RetryError`] is the terminal outcome of a failed retry run; it always
//! wraps the operation's own error type so callers keep full access to it.
//! [`ConfigError`] covers invalid settings coming from outside the program.

use thiserror::Error;

/// Result type alias for configuration loading.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Terminal outcome of a retry run that did not succeed.
///
/// Each variant corresponds to one way the loop can stop. The attempt count
/// is always the number of times the operation was actually invoked.
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// The retry predicate rejected the error; no further attempts were made.
    #[error("non-retryable error after {attempts} attempt(s): {source}")]
    NonRetryable {
        /// Number of operation invocations.
        attempts: u32,
        /// The rejected error.
        source: E,
    },

    /// Every allowed attempt failed. Only the last error is kept.
    #[error("retries exhausted after {attempts} attempt(s): {source}")]
    Exhausted {
        /// Number of operation invocations (`1 + max_retries`).
        attempts: u32,
        /// Error returned by the final attempt.
        source: E,
    },

    /// The cancellation signal fired before an attempt or during a wait.
    #[error("retry cancelled after {attempts} attempt(s)")]
    Cancelled {
        /// Number of operation invocations before cancellation was observed.
        attempts: u32,
        /// Most recent transient error, if any attempt had run.
        last_error: Option<E>,
    },
}

impl<E> RetryError<E> {
    /// Number of times the operation was invoked.
    pub fn attempts(&self) -> u32 {
        match self {
            Self::NonRetryable { attempts, .. }
            | Self::Exhausted { attempts, .. }
            | Self::Cancelled { attempts, .. } => *attempts,
        }
    }

    /// The operation error carried by this outcome, if any.
    pub fn inner(&self) -> Option<&E> {
        match self {
            Self::NonRetryable { source, .. } | Self::Exhausted { source, .. } => Some(source),
            Self::Cancelled { last_error, .. } => last_error.as_ref(),
        }
    }

    /// Consume the outcome and return the operation error, if any.
    pub fn into_inner(self) -> Option<E> {
        match self {
            Self::NonRetryable { source, .. } | Self::Exhausted { source, .. } => Some(source),
            Self::Cancelled { last_error, .. } => last_error,
        }
    }

    /// Whether the run stopped because of the cancellation signal.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// Whether the run used up its retry budget.
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted { .. })
    }

    /// Whether the predicate rejected the error.
    pub fn is_non_retryable(&self) -> bool {
        matches!(self, Self::NonRetryable { .. })
    }
}

/// Invalid retry settings.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A field holds a value outside its allowed range.
    #[error("invalid value for `{field}`: {reason}")]
    Invalid {
        /// Name of the offending field
        field: &'static str,
        /// Why the value was rejected
        reason: String,
    },

    /// An environment variable could not be parsed.
    #[error("cannot parse environment variable {var}={value:?}")]
    Env {
        /// Variable name
        var: String,
        /// Raw value
        value: String,
    },

    /// A backoff strategy name did not match any built-in strategy.
    #[error("unknown backoff strategy '{0}'; expected 'constant', 'linear' or 'exponential'")]
    UnknownStrategy(String),
}
