use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use crate::MeasurementSource;

/// A signed accumulator which can be incremented and decremented by the
/// owner of the handle.
///
/// All operations are lock-free and safe to call from multiple threads.
#[derive(Debug, Default)]
pub struct Counter {
    count: AtomicI64,
    used: AtomicBool,
}

impl Counter {
    /// Create a new counter starting at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment the counter by one.
    pub fn inc(&self) {
        self.inc_by(1);
    }

    /// Increment the counter by the given amount.
    pub fn inc_by(&self, amount: i64) {
        self.count.fetch_add(amount, Ordering::Relaxed);
        self.used.store(true, Ordering::Relaxed);
    }

    /// Decrement the counter by one.
    pub fn dec(&self) {
        self.dec_by(1);
    }

    /// Decrement the counter by the given amount.
    pub fn dec_by(&self, amount: i64) {
        self.count.fetch_sub(amount, Ordering::Relaxed);
        self.used.store(true, Ordering::Relaxed);
    }

    /// Reset the counter back to zero.
    pub fn reset(&self) {
        self.count.store(0, Ordering::Relaxed);
        self.used.store(true, Ordering::Relaxed);
    }

    /// Get the current count.
    pub fn count(&self) -> i64 {
        self.count.load(Ordering::Relaxed)
    }
}

impl MeasurementSource for Counter {
    fn is_used(&self) -> bool {
        self.used.load(Ordering::Relaxed)
    }

    fn value(&self) -> f64 {
        self.count() as f64
    }
}
