//! Value distributions backed by a reservoir.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::clock::Clock;
use crate::config::ReservoirConfig;
use crate::error::Result;
use crate::reservoir::{ExponentiallyDecayingReservoir, Reservoir};
use crate::snapshot::WeightedSnapshot;

/// Tracks the distribution of a stream of values.
///
/// Every value is counted and offered to the reservoir; statistics come from
/// [`Histogram::snapshot`].
///
/// # Example
///
/// ```rust
/// use instrumetrics::Histogram;
///
/// let histogram = Histogram::default();
/// for value in [1.0, 2.0, 3.0] {
///     histogram.update(value);
/// }
/// assert_eq!(histogram.update_count(), 3);
/// assert!((histogram.snapshot().max() - 3.0).abs() < f64::EPSILON);
/// ```
#[derive(Debug)]
pub struct Histogram {
    update_count: AtomicU64,
    reservoir: Box<dyn Reservoir>,
}

impl Histogram {
    /// Creates a histogram over an exponentially decaying reservoir.
    ///
    /// # Errors
    ///
    /// Returns `MetricsError::InvalidConfig` if the configuration is invalid.
    pub fn new(config: ReservoirConfig) -> Result<Self> {
        Ok(Self::with_reservoir(ExponentiallyDecayingReservoir::new(
            config,
        )?))
    }

    /// Creates a histogram whose reservoir reads time from `clock`.
    ///
    /// # Errors
    ///
    /// Returns `MetricsError::InvalidConfig` if the configuration is invalid.
    pub fn with_clock(config: ReservoirConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        Ok(Self::with_reservoir(
            ExponentiallyDecayingReservoir::with_clock(config, clock)?,
        ))
    }

    /// Creates a histogram over any reservoir.
    #[must_use]
    pub fn with_reservoir(reservoir: impl Reservoir + 'static) -> Self {
        Self {
            update_count: AtomicU64::new(0),
            reservoir: Box::new(reservoir),
        }
    }

    /// Records a value.
    pub fn update(&self, value: f64) {
        self.update_count.fetch_add(1, Ordering::Relaxed);
        self.reservoir.update(value);
    }

    /// Returns how many values have been recorded.
    #[must_use]
    pub fn update_count(&self) -> u64 {
        self.update_count.load(Ordering::Relaxed)
    }

    /// Returns how many samples the reservoir currently describes.
    #[must_use]
    pub fn sample_size(&self) -> usize {
        self.reservoir.size()
    }

    /// Returns a snapshot of the current sample.
    #[must_use]
    pub fn snapshot(&self) -> WeightedSnapshot {
        self.reservoir.snapshot()
    }
}

impl Default for Histogram {
    fn default() -> Self {
        Self::with_reservoir(ExponentiallyDecayingReservoir::default())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use parking_lot::Mutex;

    use super::*;
    use crate::clock::ManualClock;
    use crate::snapshot::WeightedSample;

    /// Keeps the last value only.
    #[derive(Debug, Default)]
    struct LastValue(Mutex<Option<f64>>);

    impl Reservoir for LastValue {
        fn update(&self, value: f64) {
            *self.0.lock() = Some(value);
        }

        fn size(&self) -> usize {
            usize::from(self.0.lock().is_some())
        }

        fn snapshot(&self) -> WeightedSnapshot {
            let last = *self.0.lock();
            let samples = last
                .map(|value| WeightedSample::new(value, 1.0))
                .into_iter()
                .collect();
            WeightedSnapshot::new(samples)
        }
    }

    #[test]
    fn empty_histogram_reports_zeros() {
        let histogram = Histogram::default();
        let snapshot = histogram.snapshot();
        assert_eq!(histogram.update_count(), 0);
        assert_eq!(histogram.sample_size(), 0);
        assert!(snapshot.is_empty());
        assert!(snapshot.mean().abs() < f64::EPSILON);
    }

    #[test]
    fn counts_every_update_beyond_reservoir_size() {
        let histogram = Histogram::new(ReservoirConfig::new(10, 0.015).with_seed(7)).unwrap();
        for value in 0..100 {
            histogram.update(f64::from(value));
        }
        assert_eq!(histogram.update_count(), 100);
        assert_eq!(histogram.sample_size(), 10);
        assert_eq!(histogram.snapshot().size(), 10);
    }

    #[test]
    fn snapshot_reflects_recorded_values() {
        let histogram = Histogram::default();
        for value in [5.0, 1.0, 3.0] {
            histogram.update(value);
        }
        let snapshot = histogram.snapshot();
        assert_eq!(snapshot.values(), &[1.0, 3.0, 5.0]);
        assert!((snapshot.min() - 1.0).abs() < f64::EPSILON);
        assert!((snapshot.max() - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn recent_values_dominate_after_time_passes() {
        let clock = ManualClock::new();
        let config = ReservoirConfig::new(1000, 0.015).with_seed(11);
        let histogram = Histogram::with_clock(config, Arc::new(clock.clone())).unwrap();

        for _ in 0..40 {
            histogram.update(177.0);
        }
        clock.advance(Duration::from_secs(120));
        for _ in 0..10 {
            histogram.update(9999.0);
        }

        let snapshot = histogram.snapshot();
        assert!((snapshot.median() - 9999.0).abs() < f64::EPSILON);
        assert_eq!(histogram.update_count(), 50);
    }

    #[test]
    fn custom_reservoir_is_used() {
        let histogram = Histogram::with_reservoir(LastValue::default());
        histogram.update(1.0);
        histogram.update(2.0);
        assert_eq!(histogram.update_count(), 2);
        assert_eq!(histogram.sample_size(), 1);
        assert_eq!(histogram.snapshot().values(), &[2.0]);
    }

    #[test]
    fn invalid_config_is_rejected() {
        assert!(Histogram::new(ReservoirConfig::new(0, 0.015)).is_err());
    }
}
