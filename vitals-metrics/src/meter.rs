use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::MeasurementSource;

const DEFAULT_RATE_UNIT: Duration = Duration::from_secs(1);
const DEFAULT_TIMEFRAME: Duration = Duration::from_secs(60);

/// An event-rate source which reports the number of occurrences per rate
/// unit, computed over a rolling timeframe window.
///
/// Marks older than the timeframe are pruned and no longer contribute to the
/// reported rate.
#[derive(Debug)]
pub struct Meter {
    rate_unit: Duration,
    timeframe: Duration,
    marks: Mutex<VecDeque<(Instant, u64)>>,
    used: AtomicBool,
}

impl Meter {
    /// Create a new meter reporting occurrences per second over the last
    /// minute.
    pub fn new() -> Self {
        Self::with_config(DEFAULT_RATE_UNIT, DEFAULT_TIMEFRAME)
    }

    /// Create a new meter with the given rate unit and timeframe window.
    /// A zero duration falls back to the corresponding default.
    pub fn with_config(rate_unit: Duration, timeframe: Duration) -> Self {
        let rate_unit = if rate_unit.is_zero() {
            DEFAULT_RATE_UNIT
        } else {
            rate_unit
        };
        let timeframe = if timeframe.is_zero() {
            DEFAULT_TIMEFRAME
        } else {
            timeframe
        };

        Self {
            rate_unit,
            timeframe,
            marks: Mutex::new(VecDeque::new()),
            used: AtomicBool::new(false),
        }
    }

    /// Record a single occurrence.
    pub fn mark(&self) {
        self.mark_n(1);
    }

    /// Record the given number of occurrences.
    pub fn mark_n(&self, amount: u64) {
        let mut marks = self.marks.lock();
        marks.push_back((Instant::now(), amount));
        Self::prune(&mut marks, self.timeframe);
        self.used.store(true, Ordering::Relaxed);
    }

    /// The configured timeframe window of this meter.
    pub fn timeframe(&self) -> Duration {
        self.timeframe
    }

    fn prune(marks: &mut VecDeque<(Instant, u64)>, timeframe: Duration) {
        let now = Instant::now();
        while let Some((instant, _)) = marks.front() {
            if now.duration_since(*instant) > timeframe {
                marks.pop_front();
            } else {
                break;
            }
        }
    }
}

impl Default for Meter {
    fn default() -> Self {
        Self::new()
    }
}

impl MeasurementSource for Meter {
    fn is_used(&self) -> bool {
        self.used.load(Ordering::Relaxed)
    }

    fn value(&self) -> f64 {
        let mut marks = self.marks.lock();
        Self::prune(&mut marks, self.timeframe);
        let total: u64 = marks.iter().map(|(_, amount)| *amount).sum();

        total as f64 * self.rate_unit.as_secs_f64() / self.timeframe.as_secs_f64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_meter_is_used() {
        let meter = Meter::new();
        assert_eq!(false, meter.is_used(), "expected a new meter to be unused");

        meter.mark();

        assert_eq!(true, meter.is_used());
    }

    #[test]
    fn test_meter_rate_per_second() {
        let meter = Meter::with_config(Duration::from_secs(1), Duration::from_secs(10));

        meter.mark_n(20);

        assert_eq!(2.0, meter.value());
    }

    #[test]
    fn test_meter_rate_unit() {
        let meter = Meter::with_config(Duration::from_secs(5), Duration::from_secs(10));

        meter.mark_n(20);

        assert_eq!(10.0, meter.value());
    }

    #[test]
    fn test_meter_prunes_expired_marks() {
        let meter = Meter::with_config(Duration::from_millis(10), Duration::from_millis(50));

        meter.mark_n(100);
        thread::sleep(Duration::from_millis(80));

        assert_eq!(0.0, meter.value());
        assert_eq!(
            true,
            meter.is_used(),
            "expected the meter to remain used after its marks expired"
        );
    }

    #[test]
    fn test_meter_zero_config_falls_back_to_defaults() {
        let meter = Meter::with_config(Duration::ZERO, Duration::ZERO);

        assert_eq!(DEFAULT_TIMEFRAME, meter.timeframe());
    }
}
