//! Example: Retrying an unreliable operation
//!
//! This example demonstrates:
//! 1. Simple retry with exponential backoff
//! 2. Custom retry predicate (only retry network errors)
//! 3. Cap and jitter (run multiple times to see variance)
//! 4. Cancelling a run that is waiting between attempts
//!
//! Run with:
//! ```bash
//! RUST_LOG=turboretry=debug cargo run -p turboretry --example retry_example
//! ```

use std::error::Error;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use turboretry::prelude::*;

/// A simulated API that fails the first few times
struct UnreliableApi {
    attempts: Arc<AtomicU32>,
    fail_count: u32,
}

impl UnreliableApi {
    fn new(fail_count: u32) -> Self {
        Self {
            attempts: Arc::new(AtomicU32::new(0)),
            fail_count,
        }
    }

    async fn call(&self) -> Result<String, io::Error> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);

        if attempt < self.fail_count {
            println!("  Attempt {}: FAILED (simulating network error)", attempt + 1);
            Err(io::Error::new(
                io::ErrorKind::ConnectionReset,
                format!("network error on attempt {}", attempt + 1),
            ))
        } else {
            println!("  Attempt {}: SUCCESS", attempt + 1);
            Ok("API response data".to_string())
        }
    }

    fn total_attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

/// Example 1: Simple retry with exponential backoff
async fn example_simple_retry() -> Result<(), Box<dyn Error>> {
    println!("\n=== Example 1: Simple Retry with Exponential Backoff ===\n");

    let retrier = Retrier::new(
        RetryConfig::builder()
            .max_retries(3)
            .base_backoff(Duration::from_millis(100))
            .exponential_backoff()
            .on_retry(|attempt, err| println!("  -> retry #{attempt} after: {err}"))
            .operation_name("unreliable_api")
            .build(),
    );

    let api = UnreliableApi::new(2);

    println!("Calling unreliable API (will fail 2 times before succeeding)...");
    let start = Instant::now();

    let result = retrier.execute(|| api.call()).await?;

    println!("\nResult: {}", result);
    println!("Total attempts: {}", api.total_attempts());
    println!("Total time: {:?}", start.elapsed());
    println!("Expected delays: 100ms + 200ms = ~300ms");

    Ok(())
}

/// Example 2: Custom retry predicate (only retry network errors)
async fn example_custom_predicate() -> Result<(), Box<dyn Error>> {
    println!("\n=== Example 2: Custom Retry Predicate (Network Errors Only) ===\n");

    let retrier = Retrier::new(
        RetryConfig::builder()
            .max_retries(3)
            .base_backoff(Duration::from_millis(10))
            .retry_if(|err| {
                err.downcast_ref::<io::Error>()
                    .is_some_and(|e| e.kind() == io::ErrorKind::ConnectionReset)
            })
            .build(),
    );

    println!("Test 1: Auth error (should NOT retry)");
    let result = retrier
        .execute(|| async {
            Err::<(), _>(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "auth failed",
            ))
        })
        .await;
    match result {
        Err(err) => println!("  Gave up: {} (non-retryable: {})", err, err.is_non_retryable()),
        Ok(()) => println!("  Unexpected success"),
    }

    println!("\nTest 2: Network error (should retry)");
    let api = UnreliableApi::new(2);
    let result = retrier.execute(|| api.call()).await?;
    println!("  Result: {}", result);
    println!("  Total attempts: {}", api.total_attempts());

    Ok(())
}

/// Example 3: Cap and jitter
async fn example_cap_and_jitter() -> Result<(), Box<dyn Error>> {
    println!("\n=== Example 3: Cap and Jitter ===\n");

    let policy = BackoffPolicy::new(
        Duration::from_millis(100),
        Arc::new(Exponential),
        Some(Duration::from_millis(500)),
        Some(Duration::from_millis(50)),
    );

    println!("Exponential, base 100ms, cap 500ms, jitter up to 50ms:");
    for attempt in 1..=6 {
        println!(
            "  attempt {}: capped {:?}, with jitter {:?}",
            attempt,
            policy.capped_delay(attempt),
            policy.delay_for(attempt)
        );
    }
    println!("\nNote: jitter is added after the cap, so waits can exceed 500ms by up to 50ms");

    Ok(())
}

/// Example 4: Cancellation while waiting
async fn example_cancellation() -> Result<(), Box<dyn Error>> {
    println!("\n=== Example 4: Cancellation During Backoff ===\n");

    let token = CancellationToken::new();
    let retrier = Retrier::new(
        RetryConfig::builder()
            .max_retries(10)
            .base_backoff(Duration::from_secs(5))
            .build(),
    );

    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        println!("  Cancelling...");
        trigger.cancel();
    });

    let api = UnreliableApi::new(u32::MAX);
    let start = Instant::now();
    let result = retrier
        .execute_with_cancel(|| api.call(), &token)
        .await;

    match result {
        Err(err) if err.is_cancelled() => {
            println!("  {} (after {:?}, not 5s)", err, start.elapsed());
        }
        other => println!("  Unexpected outcome: {:?}", other),
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("==============================================");
    println!("   turboretry: Retry Examples");
    println!("==============================================");

    example_simple_retry().await?;
    example_custom_predicate().await?;
    example_cap_and_jitter().await?;
    example_cancellation().await?;

    println!("\n==============================================");
    println!("   All examples completed successfully!");
    println!("==============================================\n");

    Ok(())
}
