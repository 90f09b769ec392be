use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::MeasurementSource;

/// A latest-value cell which always reports the most recently stored
/// observation.
///
/// The value is stored as raw bits, making updates lock-free.
#[derive(Debug, Default)]
pub struct Gauge {
    bits: AtomicU64,
    used: AtomicBool,
}

impl Gauge {
    /// Create a new unused gauge.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a new observation, replacing the previous one.
    pub fn set(&self, value: f64) {
        self.bits.store(value.to_bits(), Ordering::Relaxed);
        self.used.store(true, Ordering::Relaxed);
    }

    /// Get the most recently stored observation, or `0.0` when the gauge
    /// has never been set.
    pub fn get(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Relaxed))
    }
}

impl MeasurementSource for Gauge {
    fn is_used(&self) -> bool {
        self.used.load(Ordering::Relaxed)
    }

    fn value(&self) -> f64 {
        self.get()
    }
}
