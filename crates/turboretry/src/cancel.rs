//! Cancellation signals observed by the retry loop.

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// How an interruptible sleep ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wakeup {
    /// The full delay elapsed.
    Elapsed,
    /// The signal fired before the delay elapsed.
    Cancelled,
}

/// An external signal that can stop a retry loop.
///
/// The executor polls [`is_cancelled`](CancelSignal::is_cancelled) before
/// every attempt and races [`sleep`](CancelSignal::sleep) against the signal
/// while waiting between attempts. Cancellation is cooperative: an attempt
/// that is already running is never interrupted.
///
/// Implemented for [`CancellationToken`] and for [`NeverCancel`]. Custom
/// signals only need `is_cancelled` and `cancelled`.
///
/// # Examples
///
/// ```rust
/// use turboretry::cancel::{CancelSignal, Wakeup};
/// use tokio_util::sync::CancellationToken;
/// use std::time::Duration;
///
/// # #[tokio::main]
/// # async fn main() {
/// let token = CancellationToken::new();
/// token.cancel();
/// assert_eq!(token.sleep(Duration::from_secs(60)).await, Wakeup::Cancelled);
/// # }
/// ```
#[async_trait]
pub trait CancelSignal: fmt::Debug + Send + Sync {
    /// Whether the signal has already fired.
    fn is_cancelled(&self) -> bool;

    /// Resolves once the signal fires. Must never resolve otherwise.
    async fn cancelled(&self);

    /// Sleep for `delay`, waking early if the signal fires.
    ///
    /// Cancellation wins ties: a signal that is already set returns
    /// [`Wakeup::Cancelled`] even for a zero delay.
    async fn sleep(&self, delay: Duration) -> Wakeup {
        if self.is_cancelled() {
            return Wakeup::Cancelled;
        }
        tokio::select! {
            biased;
            () = self.cancelled() => Wakeup::Cancelled,
            () = tokio::time::sleep(delay) => Wakeup::Elapsed,
        }
    }
}

#[async_trait]
impl CancelSignal for CancellationToken {
    fn is_cancelled(&self) -> bool {
        CancellationToken::is_cancelled(self)
    }

    async fn cancelled(&self) {
        CancellationToken::cancelled(self).await;
    }
}

/// A signal that never fires. Used when no cancellation is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverCancel;

#[async_trait]
impl CancelSignal for NeverCancel {
    fn is_cancelled(&self) -> bool {
        false
    }

    async fn cancelled(&self) {
        std::future::pending::<()>().await;
    }

    async fn sleep(&self, delay: Duration) -> Wakeup {
        tokio::time::sleep(delay).await;
        Wakeup::Elapsed
    }
}
