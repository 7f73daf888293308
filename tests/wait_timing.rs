//! Timing tests for the status polling helpers

use std::cell::Cell;
use std::time::{Duration, Instant};

use vibrationview::{wait_until_false, wait_until_true};

#[test]
fn test_never_true_times_out() {
    let start = Instant::now();
    let result = wait_until_true(|| false, Duration::from_millis(200), Duration::from_millis(20));
    let elapsed = start.elapsed();

    println!("Timeout took: {:?}", elapsed);

    assert!(!result);
    // Should take approximately 200ms (allow one interval plus slack)
    assert!(
        elapsed.as_millis() >= 200 && elapsed.as_millis() <= 350,
        "Expected ~200ms, got {}ms",
        elapsed.as_millis()
    );
}

#[test]
fn test_initially_false_returns_immediately() {
    let start = Instant::now();
    let result = wait_until_false(|| false, Duration::from_secs(5), Duration::from_millis(100));

    assert!(!result);
    assert!(start.elapsed() < Duration::from_millis(50));
}

#[test]
fn test_becomes_true_after_a_few_samples() {
    let samples = Cell::new(0);
    let start = Instant::now();
    let result = wait_until_true(
        || {
            samples.set(samples.get() + 1);
            samples.get() >= 3
        },
        Duration::from_secs(2),
        Duration::from_millis(10),
    );

    assert!(result);
    assert_eq!(samples.get(), 3);
    assert!(start.elapsed() < Duration::from_millis(500));
}

#[test]
fn test_never_false_reports_true_after_timeout() {
    let start = Instant::now();
    let result = wait_until_false(|| true, Duration::from_millis(100), Duration::from_millis(10));

    assert!(result);
    assert!(start.elapsed() >= Duration::from_millis(100));
}
