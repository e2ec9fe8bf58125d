//! Property-based tests for turboretry
//!
//! This module uses proptest to generate random inputs and verify invariants
//! of the backoff computation and the retry loop.

#[cfg(test)]
mod tests {
    use crate::backoff::{BackoffPolicy, BackoffStrategy, Constant, Exponential, Linear, compute_delay};
    use crate::config::RetryConfig;
    use crate::executor::Retrier;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    // ===== Strategy Generators =====

    fn arb_base() -> impl Strategy<Value = Duration> {
        (0u64..10_000u64).prop_map(Duration::from_millis)
    }

    fn arb_attempt() -> impl Strategy<Value = u32> {
        1u32..32u32
    }

    fn arb_optional_millis() -> impl Strategy<Value = Option<Duration>> {
        prop::option::of((1u64..5_000u64).prop_map(Duration::from_millis))
    }

    fn arb_strategy() -> impl Strategy<Value = Arc<dyn BackoffStrategy>> {
        prop_oneof![
            Just(Arc::new(Constant) as Arc<dyn BackoffStrategy>),
            Just(Arc::new(Linear) as Arc<dyn BackoffStrategy>),
            Just(Arc::new(Exponential) as Arc<dyn BackoffStrategy>),
        ]
    }

    fn current_thread_runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .start_paused(true)
            .build()
            .expect("Failed to build runtime")
    }

    // ===== Backoff Properties =====

    proptest! {
        /// Property: Exponential delay doubles per attempt
        /// Invariant: delay(k) == base * 2^(k-1) while it fits
        #[test]
        fn prop_exponential_formula(base in arb_base(), attempt in arb_attempt()) {
            let expected = base
                .checked_mul(1u32 << (attempt - 1))
                .unwrap_or(Duration::MAX);
            prop_assert_eq!(Exponential.delay(base, attempt), expected);
        }

        /// Property: Linear delay is base times attempt
        #[test]
        fn prop_linear_formula(base in arb_base(), attempt in arb_attempt()) {
            prop_assert_eq!(Linear.delay(base, attempt), base * attempt);
        }

        /// Property: Exponential growth never wraps
        /// Invariant: delay is monotonically non-decreasing in the attempt index
        #[test]
        fn prop_exponential_monotonic(base in arb_base(), attempt in 1u32..200u32) {
            prop_assert!(Exponential.delay(base, attempt + 1) >= Exponential.delay(base, attempt));
        }

        /// Property: Cap applies before jitter
        /// Invariant: min(raw, L) <= delay <= min(raw, L) + J
        #[test]
        fn prop_delay_bounded_by_cap_plus_jitter(
            base in arb_base(),
            attempt in arb_attempt(),
            strategy in arb_strategy(),
            limit in arb_optional_millis(),
            max_jitter in arb_optional_millis(),
            seed in any::<u64>(),
        ) {
            let mut rng = StdRng::seed_from_u64(seed);
            let raw = strategy.delay(base, attempt);
            let capped = match limit {
                Some(limit) => raw.min(limit),
                None => raw,
            };

            let delay = compute_delay(base, attempt, strategy.as_ref(), limit, max_jitter, &mut rng);

            prop_assert!(delay >= capped);
            prop_assert!(delay <= capped.saturating_add(max_jitter.unwrap_or(Duration::ZERO)));
        }

        /// Property: Without jitter the cap is a hard ceiling
        #[test]
        fn prop_cap_is_ceiling_without_jitter(
            base in arb_base(),
            attempt in arb_attempt(),
            strategy in arb_strategy(),
            limit in (1u64..5_000u64).prop_map(Duration::from_millis),
        ) {
            let policy = BackoffPolicy::new(base, strategy, Some(limit), None);
            prop_assert!(policy.delay_for(attempt) <= limit);
        }
    }

    // ===== Retry Loop Properties =====

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        /// Property: A permanently failing operation runs exactly n + 1 times
        /// Invariant: on_retry fires n times with indices 1..=n
        #[test]
        fn prop_attempt_budget(max_retries in 0u32..8u32) {
            let rt = current_thread_runtime();
            let retries = Arc::new(Mutex::new(Vec::new()));
            let sink = Arc::clone(&retries);
            let retrier = Retrier::new(
                RetryConfig::builder()
                    .max_retries(max_retries)
                    .base_backoff(Duration::from_millis(5))
                    .exponential_backoff()
                    .on_retry(move |attempt, _| sink.lock().unwrap().push(attempt))
                    .build(),
            );
            let calls = AtomicU32::new(0);

            let result = rt.block_on(retrier.execute(|| {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move { Err::<(), _>(std::io::Error::other(format!("attempt {n}"))) }
            }));

            let err = result.unwrap_err();
            prop_assert!(err.is_exhausted());
            prop_assert_eq!(calls.load(Ordering::SeqCst), max_retries + 1);
            prop_assert_eq!(err.attempts(), max_retries + 1);
            let expected_message = format!("attempt {}", max_retries + 1);
            prop_assert_eq!(err.into_inner().unwrap().to_string(), expected_message);
            prop_assert_eq!(
                retries.lock().unwrap().clone(),
                (1..=max_retries).collect::<Vec<_>>()
            );
        }

        /// Property: A rejected error is never retried, whatever the budget
        #[test]
        fn prop_non_retryable_runs_once(max_retries in 0u32..50u32) {
            let rt = current_thread_runtime();
            let retrier = Retrier::new(
                RetryConfig::builder()
                    .max_retries(max_retries)
                    .retry_if(|_| false)
                    .build(),
            );
            let calls = AtomicU32::new(0);

            let result = rt.block_on(retrier.execute(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(std::io::Error::other("fatal")) }
            }));

            prop_assert!(result.unwrap_err().is_non_retryable());
            prop_assert_eq!(calls.load(Ordering::SeqCst), 1);
        }
    }
}
