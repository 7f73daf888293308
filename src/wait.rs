//! Polling helpers for status flags.
//!
//! Both helpers block the calling thread and sleep a fixed interval between
//! samples. There is no cancellation.

use std::thread;
use std::time::{Duration, Instant};

/// Default overall timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
/// Default sleep between samples.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(100);

/// Timeout and sampling interval for a wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitSettings {
    /// Give up after this long
    pub timeout: Duration,
    /// Sleep between samples
    pub interval: Duration,
}

impl Default for WaitSettings {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            interval: DEFAULT_INTERVAL,
        }
    }
}

impl WaitSettings {
    /// Shorthand for [`wait_until_true`] with these settings.
    pub fn until_true(&self, predicate: impl FnMut() -> bool) -> bool {
        wait_until_true(predicate, self.timeout, self.interval)
    }

    /// Shorthand for [`wait_until_false`] with these settings.
    pub fn until_false(&self, predicate: impl FnMut() -> bool) -> bool {
        wait_until_false(predicate, self.timeout, self.interval)
    }
}

/// Poll `predicate` until it reads true or `timeout` elapses.
///
/// The predicate is sampled at least once. Returns the last observed value, so
/// `false` means the timeout was reached.
pub fn wait_until_true(mut predicate: impl FnMut() -> bool, timeout: Duration, interval: Duration) -> bool {
    let start = Instant::now();
    loop {
        if predicate() {
            return true;
        }
        if start.elapsed() >= timeout {
            return false;
        }
        thread::sleep(interval);
    }
}

/// Poll `predicate` until it reads false or `timeout` elapses.
///
/// Returns `false` as soon as a sample is false, without sleeping first; `true`
/// means the condition still held when the timeout was reached.
pub fn wait_until_false(mut predicate: impl FnMut() -> bool, timeout: Duration, interval: Duration) -> bool {
    let start = Instant::now();
    loop {
        if !predicate() {
            return false;
        }
        if start.elapsed() >= timeout {
            return true;
        }
        thread::sleep(interval);
    }
}
