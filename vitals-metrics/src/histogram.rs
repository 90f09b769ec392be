use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

use derive_more::Display;
use parking_lot::Mutex;

use crate::MeasurementSource;

/// The default number of retained observations.
pub const DEFAULT_SAMPLE_SIZE: usize = 1028;

/// The closed set of statistics a histogram can derive from its
/// observations.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Default)]
pub enum Measurement {
    #[display("min")]
    Min,
    #[display("max")]
    Max,
    #[display("sum")]
    Sum,
    #[display("count")]
    Count,
    #[display("variance")]
    Variance,
    #[default]
    #[display("mean")]
    Mean,
    #[display("stddev")]
    StdDev,
    #[display("median")]
    Median,
    #[display("p75")]
    P75,
    #[display("p95")]
    P95,
    #[display("p99")]
    P99,
    #[display("p999")]
    P999,
}

/// A statistics source over a bounded sample of the most recent
/// observations.
///
/// Count and sum are lifetime totals; all other statistics are derived from
/// the retained sample. The histogram reports the statistic it was
/// configured with as its current value, [Measurement::Mean] by default.
#[derive(Debug)]
pub struct Histogram {
    measurement: Measurement,
    state: Mutex<HistogramState>,
    used: AtomicBool,
}

#[derive(Debug)]
struct HistogramState {
    samples: VecDeque<f64>,
    capacity: usize,
    count: u64,
    sum: f64,
}

impl Histogram {
    /// Create a new histogram reporting the mean over the default sample
    /// size.
    pub fn new() -> Self {
        Self::with_config(Measurement::default(), DEFAULT_SAMPLE_SIZE)
    }

    /// Create a new histogram reporting the given statistic.
    pub fn with_measurement(measurement: Measurement) -> Self {
        Self::with_config(measurement, DEFAULT_SAMPLE_SIZE)
    }

    /// Create a new histogram reporting the given statistic over a sample
    /// of at most `sample_size` observations. A zero sample size falls back
    /// to the default.
    pub fn with_config(measurement: Measurement, sample_size: usize) -> Self {
        let capacity = if sample_size == 0 {
            DEFAULT_SAMPLE_SIZE
        } else {
            sample_size
        };

        Self {
            measurement,
            state: Mutex::new(HistogramState {
                samples: VecDeque::with_capacity(capacity),
                capacity,
                count: 0,
                sum: 0.0,
            }),
            used: AtomicBool::new(false),
        }
    }

    /// The statistic this histogram reports as its value.
    pub fn measurement(&self) -> Measurement {
        self.measurement
    }

    /// Record a new observation, evicting the oldest retained one when the
    /// sample is full.
    pub fn observe(&self, value: f64) {
        let mut state = self.state.lock();
        if state.samples.len() == state.capacity {
            state.samples.pop_front();
        }
        state.samples.push_back(value);
        state.count += 1;
        state.sum += value;
        self.used.store(true, Ordering::Relaxed);
    }

    /// The lifetime number of observations.
    pub fn count(&self) -> u64 {
        self.state.lock().count
    }

    /// The lifetime sum of all observations.
    pub fn sum(&self) -> f64 {
        self.state.lock().sum
    }

    /// Derive the given statistic from the current observations.
    /// All statistics of an empty histogram are `0.0`.
    pub fn measure(&self, measurement: Measurement) -> f64 {
        let state = self.state.lock();
        match measurement {
            Measurement::Min => Self::fold(&state, f64::min),
            Measurement::Max => Self::fold(&state, f64::max),
            Measurement::Sum => state.sum,
            Measurement::Count => state.count as f64,
            Measurement::Variance => Self::variance(&state),
            Measurement::Mean => Self::mean(&state),
            Measurement::StdDev => Self::variance(&state).sqrt(),
            Measurement::Median => Self::percentile(&state, 0.5),
            Measurement::P75 => Self::percentile(&state, 0.75),
            Measurement::P95 => Self::percentile(&state, 0.95),
            Measurement::P99 => Self::percentile(&state, 0.99),
            Measurement::P999 => Self::percentile(&state, 0.999),
        }
    }

    fn fold(state: &HistogramState, select: fn(f64, f64) -> f64) -> f64 {
        state
            .samples
            .iter()
            .copied()
            .reduce(select)
            .unwrap_or(0.0)
    }

    fn mean(state: &HistogramState) -> f64 {
        if state.samples.is_empty() {
            return 0.0;
        }

        let sum: f64 = state.samples.iter().sum();
        sum / state.samples.len() as f64
    }

    /// Sample variance, 0.0 when fewer than two observations are retained.
    fn variance(state: &HistogramState) -> f64 {
        let len = state.samples.len();
        if len < 2 {
            return 0.0;
        }

        let mean = Self::mean(state);
        let squared_deviations: f64 = state.samples.iter().map(|e| (e - mean) * (e - mean)).sum();
        squared_deviations / (len - 1) as f64
    }

    /// Percentile over the retained sample, linearly interpolated between
    /// the closest ranks.
    fn percentile(state: &HistogramState, quantile: f64) -> f64 {
        if state.samples.is_empty() {
            return 0.0;
        }

        let mut sorted: Vec<f64> = state.samples.iter().copied().collect();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let rank = quantile * (sorted.len() - 1) as f64;
        let lower = rank.floor() as usize;
        let fraction = rank - lower as f64;

        match sorted.get(lower + 1) {
            Some(upper) => sorted[lower] + fraction * (upper - sorted[lower]),
            None => sorted[lower],
        }
    }
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

impl MeasurementSource for Histogram {
    fn is_used(&self) -> bool {
        self.used.load(Ordering::Relaxed)
    }

    fn value(&self) -> f64 {
        self.measure(self.measurement)
    }
}
