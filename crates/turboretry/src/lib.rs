#![deny(unsafe_code)]
#![warn(missing_docs)]

//! Retry orchestration for async operations.
//!
//! This crate runs a caller-supplied operation until it succeeds, the retry
//! budget is spent, a predicate rejects the error, or a cancellation signal
//! fires:
//!
//! - **Retry executor** via [`Retrier`] and [`retry`]
//!   - Attempt budget (`1 + max_retries` attempts)
//!   - Retry predicate and per-retry callback
//!   - Cancellation before attempts and during waits
//! - **Backoff policy** via the [`BackoffStrategy`](backoff::BackoffStrategy) trait
//!   - Constant, linear and exponential growth, or any closure
//!   - Optional cap applied before jitter
//!   - Optional uniform jitter applied after the cap
//! - **Configuration** via [`RetryConfig::builder`] or serializable
//!   [`RetrySettings`](config::RetrySettings)
//!
//! # Examples
//!
//! Using the prelude for convenient imports:
//!
//! ```rust
//! use turboretry::prelude::*;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let retrier = Retrier::new(
//!     RetryConfig::builder()
//!         .max_retries(3)
//!         .base_backoff(Duration::from_millis(100))
//!         .exponential_backoff()
//!         .backoff_limit(Duration::from_secs(2))
//!         .max_jitter(Duration::from_millis(20))
//!         .build(),
//! );
//!
//! let _value = retrier.execute(|| async {
//!     Ok::<_, std::io::Error>(42)
//! }).await?;
//! # Ok(())
//! # }
//! ```
//!
//! Cancelling a run from another task:
//!
//! ```rust
//! use turboretry::prelude::*;
//! use tokio_util::sync::CancellationToken;
//! use std::time::Duration;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let token = CancellationToken::new();
//! let retrier = Retrier::new(
//!     RetryConfig::builder()
//!         .base_backoff(Duration::from_secs(30))
//!         .cancellation(token.clone())
//!         .build(),
//! );
//!
//! tokio::spawn(async move {
//!     tokio::time::sleep(Duration::from_millis(10)).await;
//!     token.cancel();
//! });
//!
//! let err = retrier
//!     .execute(|| async { Err::<(), _>(std::io::Error::other("unavailable")) })
//!     .await
//!     .unwrap_err();
//! assert!(err.is_cancelled());
//! # }
//! ```

pub mod backoff;
pub mod cancel;
pub mod config;
pub mod error;
pub mod executor;

#[cfg(test)]
mod property_tests;

pub use config::{RetryConfig, RetryConfigBuilder};
pub use error::{ConfigError, RetryError};
pub use executor::{Retrier, retry};

/// Convenient re-exports of commonly used items.
///
/// Import all core abstractions with:
///
/// ```rust
/// use turboretry::prelude::*;
/// ```
pub mod prelude {
    pub use crate::backoff::{
        BackoffKind, BackoffPolicy, BackoffStrategy, Constant, CustomBackoff, Exponential, Linear,
    };
    pub use crate::cancel::{CancelSignal, NeverCancel, Wakeup};
    pub use crate::config::{RetryConfig, RetryConfigBuilder, RetrySettings};
    pub use crate::error::{ConfigError, RetryError};
    pub use crate::executor::{Retrier, retry};
}
