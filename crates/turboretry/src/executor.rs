//! The retry loop.

use crate::cancel::{CancelSignal, NeverCancel, Wakeup};
use crate::config::RetryConfig;
use crate::error::RetryError;
use std::error::Error;
use std::future::Future;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

/// Runs operations under a [`RetryConfig`].
///
/// Each call to [`execute`](Retrier::execute) is an independent, sequential
/// loop with its own attempt counter, so one `Retrier` can drive many
/// concurrent operations.
///
/// # Loop
///
/// ```text
/// check cancellation -> attempt -> Ok                  => return value
///                               -> Err, not retryable  => NonRetryable
///                               -> Err, budget used    => Exhausted
///                               -> Err, otherwise      => on_retry, wait, repeat
/// ```
///
/// # Examples
///
/// ```rust
/// use turboretry::{Retrier, RetryConfig};
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicU32, Ordering};
/// use std::time::Duration;
///
/// # #[tokio::main]
/// # async fn main() {
/// let retrier = Retrier::new(
///     RetryConfig::builder()
///         .max_retries(3)
///         .base_backoff(Duration::from_millis(1))
///         .exponential_backoff()
///         .build(),
/// );
///
/// let calls = Arc::new(AtomicU32::new(0));
/// let value = retrier
///     .execute(|| {
///         let calls = Arc::clone(&calls);
///         async move {
///             if calls.fetch_add(1, Ordering::SeqCst) < 2 {
///                 Err(std::io::Error::other("flaky"))
///             } else {
///                 Ok(42)
///             }
///         }
///     })
///     .await
///     .unwrap();
///
/// assert_eq!(value, 42);
/// assert_eq!(calls.load(Ordering::SeqCst), 3);
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct Retrier {
    config: RetryConfig,
}

impl From<RetryConfig> for Retrier {
    fn from(config: RetryConfig) -> Self {
        Self::new(config)
    }
}

impl Retrier {
    /// Create a retrier for `config`.
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// The configuration this retrier runs with.
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Run `operation` until it succeeds or the loop stops.
    ///
    /// Uses the cancellation signal from the configuration, if one was set.
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Error + 'static,
    {
        match self.config.cancellation() {
            Some(signal) => run_loop(&self.config, operation, signal.as_ref()).await,
            None => run_loop(&self.config, operation, &NeverCancel).await,
        }
    }

    /// Run `operation` observing `signal` instead of the configured one.
    pub async fn execute_with_cancel<F, Fut, T, E>(
        &self,
        operation: F,
        signal: &dyn CancelSignal,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Error + 'static,
    {
        run_loop(&self.config, operation, signal).await
    }
}

async fn run_loop<F, Fut, T, E>(
    config: &RetryConfig,
    mut operation: F,
    signal: &dyn CancelSignal,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Error + 'static,
{
    let name = config.operation_name().unwrap_or("operation");
    let max_attempts = config.max_attempts();
    let start = Instant::now();
    let mut attempt: u32 = 0;
    let mut last_error: Option<E> = None;

    loop {
        if signal.is_cancelled() {
            debug!(operation = %name, attempts = attempt, "retry.cancelled");
            return Err(RetryError::Cancelled {
                attempts: attempt,
                last_error,
            });
        }

        attempt += 1;
        let err = match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(
                        operation = %name,
                        attempts = attempt,
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        "retry.succeeded"
                    );
                }
                return Ok(value);
            }
            Err(err) => err,
        };

        if !config.is_retryable(&err) {
            trace!(operation = %name, attempt, error = %err, "retry.non_retryable");
            return Err(RetryError::NonRetryable {
                attempts: attempt,
                source: err,
            });
        }

        if attempt >= max_attempts {
            warn!(
                operation = %name,
                attempts = attempt,
                elapsed_ms = start.elapsed().as_millis() as u64,
                error = %err,
                "retry.exhausted"
            );
            return Err(RetryError::Exhausted {
                attempts: attempt,
                source: err,
            });
        }

        // The attempt may have outlived the signal; no callback after cancellation.
        if signal.is_cancelled() {
            debug!(operation = %name, attempts = attempt, "retry.cancelled");
            return Err(RetryError::Cancelled {
                attempts: attempt,
                last_error: Some(err),
            });
        }

        let delay = config.backoff().delay_for(attempt);
        config.notify_retry(attempt, &err);
        debug!(
            operation = %name,
            attempt,
            max_attempts,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "retry.scheduling"
        );

        if signal.sleep(delay).await == Wakeup::Cancelled {
            debug!(
                operation = %name,
                attempts = attempt,
                "retry.cancelled_during_backoff"
            );
            return Err(RetryError::Cancelled {
                attempts: attempt,
                last_error: Some(err),
            });
        }
        last_error = Some(err);
    }
}

/// Run `operation` once under `config` without keeping a [`Retrier`] around.
///
/// ```rust
/// use turboretry::{retry, RetryConfig};
///
/// # #[tokio::main]
/// # async fn main() {
/// let config = RetryConfig::builder().max_retries(0).build();
/// let result = retry(|| async { Err::<(), _>(std::io::Error::other("down")) }, &config).await;
///
/// let err = result.unwrap_err();
/// assert!(err.is_exhausted());
/// assert_eq!(err.attempts(), 1);
/// # }
/// ```
pub async fn retry<F, Fut, T, E>(operation: F, config: &RetryConfig) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Error + 'static,
{
    match config.cancellation() {
        Some(signal) => run_loop(config, operation, signal.as_ref()).await,
        None => run_loop(config, operation, &NeverCancel).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    fn fast_config(max_retries: u32) -> RetryConfig {
        RetryConfig::builder()
            .max_retries(max_retries)
            .base_backoff(Duration::from_millis(1))
            .build()
    }

    #[tokio::test]
    async fn test_immediate_success() {
        let retrier = Retrier::default();

        let result = retrier.execute(|| async { Ok::<_, io::Error>(42) }).await;

        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_success_on_third_attempt() {
        let retrier = Retrier::new(fast_config(5));
        let attempts = Arc::new(AtomicU32::new(0));
        let attempts_clone = Arc::clone(&attempts);

        let result = retrier
            .execute(|| {
                let attempts = Arc::clone(&attempts_clone);
                async move {
                    let current = attempts.fetch_add(1, Ordering::SeqCst);
                    if current < 2 {
                        Err(io::Error::other("retry me"))
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_max_retries_exceeded() {
        let retrier = Retrier::new(fast_config(2));
        let attempts = Arc::new(AtomicU32::new(0));
        let attempts_clone = Arc::clone(&attempts);

        let result = retrier
            .execute(|| {
                let attempts = Arc::clone(&attempts_clone);
                async move {
                    let n = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                    Err::<(), _>(io::Error::other(format!("failure {n}")))
                }
            })
            .await;

        let err = result.unwrap_err();
        assert!(err.is_exhausted());
        assert_eq!(err.attempts(), 3);
        assert_eq!(err.into_inner().unwrap().to_string(), "failure 3");
        // Should try: initial attempt + 2 retries = 3 total
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_zero_retries_runs_once() {
        let retrier = Retrier::new(fast_config(0));
        let attempts = AtomicU32::new(0);

        let result = retrier
            .execute(|| {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(io::Error::other("nope")) }
            })
            .await;

        assert!(result.unwrap_err().is_exhausted());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_non_retryable_stops_immediately() {
        let retrier = Retrier::new(
            RetryConfig::builder()
                .max_retries(10)
                .base_backoff(Duration::from_millis(1))
                .retry_if(|err| err.to_string().contains("network"))
                .build(),
        );
        let attempts = AtomicU32::new(0);

        let result = retrier
            .execute(|| {
                attempts.fetch_add(1, Ordering::SeqCst);
                async {
                    Err::<(), _>(io::Error::new(
                        io::ErrorKind::PermissionDenied,
                        "auth failed",
                    ))
                }
            })
            .await;

        let err = result.unwrap_err();
        assert!(err.is_non_retryable());
        assert_eq!(err.attempts(), 1);
        assert_eq!(err.into_inner().unwrap().to_string(), "auth failed");
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_on_retry_runs_between_attempts() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let callback_events = Arc::clone(&events);
        let retrier = Retrier::new(
            RetryConfig::builder()
                .max_retries(3)
                .base_backoff(Duration::from_millis(10))
                .on_retry(move |attempt, _err| {
                    callback_events.lock().unwrap().push(format!("retry {attempt}"));
                })
                .build(),
        );

        let attempt_events = Arc::clone(&events);
        let counter = AtomicU32::new(0);
        let _ = retrier
            .execute(|| {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                attempt_events.lock().unwrap().push(format!("attempt {n}"));
                async { Err::<(), _>(io::Error::other("down")) }
            })
            .await;

        assert_eq!(
            *events.lock().unwrap(),
            vec![
                "attempt 1", "retry 1", "attempt 2", "retry 2", "attempt 3", "retry 3",
                "attempt 4",
            ]
        );
    }

    #[tokio::test]
    async fn test_pre_cancelled_never_invokes_operation() {
        let token = CancellationToken::new();
        token.cancel();
        let retrier = Retrier::new(fast_config(3));
        let attempts = AtomicU32::new(0);

        let result = retrier
            .execute_with_cancel(
                || {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    async { Ok::<_, io::Error>(()) }
                },
                &token,
            )
            .await;

        let err = result.unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(err.attempts(), 0);
        assert!(err.inner().is_none());
        assert_eq!(attempts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancelled_during_attempt_skips_callback() {
        let token = CancellationToken::new();
        let callbacks = Arc::new(AtomicU32::new(0));
        let callbacks_clone = Arc::clone(&callbacks);
        let retrier = Retrier::new(
            RetryConfig::builder()
                .max_retries(3)
                .on_retry(move |_, _| {
                    callbacks_clone.fetch_add(1, Ordering::SeqCst);
                })
                .cancellation(token.clone())
                .build(),
        );

        let result = retrier
            .execute(|| {
                token.cancel();
                async { Err::<(), _>(io::Error::other("in flight")) }
            })
            .await;

        let err = result.unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(err.attempts(), 1);
        assert_eq!(err.inner().unwrap().to_string(), "in flight");
        assert_eq!(callbacks.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_success_wins_over_cancellation_in_flight() {
        let token = CancellationToken::new();
        let retrier = Retrier::new(fast_config(3));

        let result = retrier
            .execute_with_cancel(
                || {
                    token.cancel();
                    async { Ok::<_, io::Error>("done") }
                },
                &token,
            )
            .await;

        assert_eq!(result.unwrap(), "done");
    }

    #[tokio::test(start_paused = true)]
    async fn test_free_function_uses_config() {
        let config = fast_config(1);
        let attempts = AtomicU32::new(0);

        let result = retry(
            || {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(io::Error::other("still down")) }
            },
            &config,
        )
        .await;

        assert!(result.unwrap_err().is_exhausted());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }
}
