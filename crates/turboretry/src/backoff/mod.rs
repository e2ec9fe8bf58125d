//! Backoff strategies and delay computation.
//!
//! This module answers one question for the executor: how long to wait after
//! a failed attempt. The answer is built in three steps:
//!
//! 1. A [`BackoffStrategy`] turns the base delay and attempt index into a raw
//!    delay ([`Constant`], [`Linear`], [`Exponential`] or a [`CustomBackoff`]).
//! 2. An optional limit caps the raw delay.
//! 3. Optional jitter, uniform in `[0, max_jitter]`, is added on top.
//!
//! # Examples
//!
//! ```rust
//! use turboretry::backoff::{BackoffPolicy, Linear};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let policy = BackoffPolicy::new(
//!     Duration::from_millis(100),
//!     Arc::new(Linear),
//!     Some(Duration::from_millis(250)),
//!     None,
//! );
//!
//! assert_eq!(policy.delay_for(1), Duration::from_millis(100));
//! assert_eq!(policy.delay_for(2), Duration::from_millis(200));
//! assert_eq!(policy.delay_for(3), Duration::from_millis(250));
//! ```

mod policy;
mod strategy;

pub use policy::{BackoffPolicy, compute_delay};
pub use strategy::{BackoffKind, BackoffStrategy, Constant, CustomBackoff, Exponential, Linear};
