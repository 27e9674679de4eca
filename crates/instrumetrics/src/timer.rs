//! Duration measurement.
//!
//! A [`Timer`] is a [`Meter`] of how often something happens combined with a
//! [`Histogram`] of how long it takes. Durations are recorded in
//! milliseconds.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::clock::{self, Clock};
use crate::config::{MeterConfig, ReservoirConfig};
use crate::error::Result;
use crate::histogram::Histogram;
use crate::meter::{Meter, MeterRates};
use crate::snapshot::WeightedSnapshot;

const NANOS_PER_MILLI: f64 = 1_000_000.0;

/// Measures event rates and duration distributions together.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
///
/// use instrumetrics::Timer;
///
/// let timer = Timer::default();
/// timer.update(Duration::from_millis(250));
///
/// let answer = timer.time(|| 6 * 7);
/// assert_eq!(answer, 42);
/// assert_eq!(timer.count(), 2);
/// ```
#[derive(Debug)]
pub struct Timer {
    meter: Meter,
    histogram: Histogram,
    clock: Arc<dyn Clock>,
}

impl Timer {
    /// Creates a timer on the system clock.
    ///
    /// # Errors
    ///
    /// Returns `MetricsError::InvalidConfig` if either configuration is invalid.
    pub fn new(reservoir: ReservoirConfig, meter: MeterConfig) -> Result<Self> {
        Self::with_clock(reservoir, meter, clock::system())
    }

    /// Creates a timer whose meter, reservoir and stopwatches read `clock`.
    ///
    /// # Errors
    ///
    /// Returns `MetricsError::InvalidConfig` if either configuration is invalid.
    pub fn with_clock(
        reservoir: ReservoirConfig,
        meter: MeterConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        Ok(Self {
            meter: Meter::with_clock(meter, Arc::clone(&clock))?,
            histogram: Histogram::with_clock(reservoir, Arc::clone(&clock))?,
            clock,
        })
    }

    /// Records one event that took `duration`.
    pub fn update(&self, duration: Duration) {
        self.meter.mark();
        self.histogram.update(duration.as_nanos() as f64 / NANOS_PER_MILLI);
    }

    /// Starts a stopwatch that records into this timer when stopped or dropped.
    #[must_use = "dropping the stopwatch immediately records a near-zero duration"]
    pub fn start(&self) -> Stopwatch<'_> {
        Stopwatch {
            timer: self,
            started: self.clock.now(),
            stopped: false,
        }
    }

    /// Runs `f` and records how long it took.
    pub fn time<T>(&self, f: impl FnOnce() -> T) -> T {
        let _stopwatch = self.start();
        f()
    }

    /// Returns how many events have been recorded.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.meter.count()
    }

    /// Returns every meter rate under a single catch-up.
    #[must_use]
    pub fn rates(&self) -> MeterRates {
        self.meter.rates()
    }

    /// Returns the event count and every meter rate, read together.
    #[must_use]
    pub fn count_and_rates(&self) -> (u64, MeterRates) {
        self.meter.count_and_rates()
    }

    /// Returns a snapshot of recorded durations, in milliseconds.
    #[must_use]
    pub fn snapshot(&self) -> WeightedSnapshot {
        self.histogram.snapshot()
    }

    /// Returns how many durations the reservoir currently describes.
    #[must_use]
    pub fn sample_size(&self) -> usize {
        self.histogram.sample_size()
    }

    /// Returns the underlying meter.
    #[must_use]
    pub const fn meter(&self) -> &Meter {
        &self.meter
    }

    /// Returns the underlying histogram.
    #[must_use]
    pub const fn histogram(&self) -> &Histogram {
        &self.histogram
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self {
            meter: Meter::default(),
            histogram: Histogram::default(),
            clock: clock::system(),
        }
    }
}

/// A running measurement started by [`Timer::start`].
///
/// The first [`stop`](Stopwatch::stop) records the elapsed time. An
/// unstopped stopwatch records when dropped.
#[derive(Debug)]
pub struct Stopwatch<'a> {
    timer: &'a Timer,
    started: Instant,
    stopped: bool,
}

impl Stopwatch<'_> {
    /// Stops the stopwatch and records the elapsed time.
    ///
    /// Returns `None` if it was already stopped.
    pub fn stop(&mut self) -> Option<Duration> {
        if self.stopped {
            return None;
        }
        self.stopped = true;

        let elapsed = self
            .timer
            .clock
            .now()
            .saturating_duration_since(self.started);
        self.timer.update(elapsed);
        Some(elapsed)
    }

    /// Returns true once the stopwatch has recorded its measurement.
    #[must_use]
    pub const fn is_stopped(&self) -> bool {
        self.stopped
    }
}

impl Drop for Stopwatch<'_> {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn timer() -> (Timer, ManualClock) {
        let clock = ManualClock::new();
        let timer = Timer::with_clock(
            ReservoirConfig::default().with_seed(3),
            MeterConfig::default(),
            Arc::new(clock.clone()),
        )
        .unwrap();
        (timer, clock)
    }

    #[test]
    fn update_marks_meter_and_records_milliseconds() {
        let (timer, _clock) = timer();
        timer.update(Duration::from_millis(1500));

        assert_eq!(timer.count(), 1);
        assert_eq!(timer.histogram().update_count(), 1);
        assert!((timer.snapshot().max() - 1500.0).abs() < 1e-9);
    }

    #[test]
    fn sub_millisecond_durations_are_fractional() {
        let (timer, _clock) = timer();
        timer.update(Duration::from_micros(250));
        assert!((timer.snapshot().max() - 0.25).abs() < 1e-9);
    }

    #[test]
    fn stopwatch_records_elapsed_once() {
        let (timer, clock) = timer();

        let mut stopwatch = timer.start();
        clock.advance(Duration::from_millis(40));
        assert_eq!(stopwatch.stop(), Some(Duration::from_millis(40)));
        assert!(stopwatch.is_stopped());

        clock.advance(Duration::from_millis(40));
        assert_eq!(stopwatch.stop(), None);
        drop(stopwatch);

        assert_eq!(timer.count(), 1);
        assert!((timer.snapshot().max() - 40.0).abs() < 1e-9);
    }

    #[test]
    fn dropped_stopwatch_records() {
        let (timer, clock) = timer();
        {
            let _stopwatch = timer.start();
            clock.advance(Duration::from_millis(7));
        }
        assert_eq!(timer.count(), 1);
        assert!((timer.snapshot().max() - 7.0).abs() < 1e-9);
    }

    #[test]
    fn time_records_closure_duration() {
        let (timer, clock) = timer();
        let value = timer.time(|| {
            clock.advance(Duration::from_millis(12));
            "done"
        });

        assert_eq!(value, "done");
        assert_eq!(timer.count(), 1);
        assert!((timer.snapshot().max() - 12.0).abs() < 1e-9);
    }

    #[test]
    fn rates_follow_meter() {
        let (timer, clock) = timer();
        for _ in 0..5 {
            timer.update(Duration::from_millis(1));
        }
        clock.advance(Duration::from_millis(5001));

        let rates = timer.rates();
        assert_eq!(format!("{:.4}", rates.one_minute_rate), "0.0736");
        assert_eq!(timer.sample_size(), 5);
    }
}
