//! Event rate metering.
//!
//! A [`Meter`] counts events and reports their mean rate since creation as
//! well as one, five and fifteen minute moving averages. There is no
//! background ticker: every read or write first catches up on the ticks
//! that elapsed since the last one.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::clock::{self, Clock};
use crate::config::MeterConfig;
use crate::error::Result;
use crate::ewma::Ewma;

/// All rates of a meter, read at one instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeterRates {
    /// Mean rate since the meter was created.
    pub mean_rate: f64,
    /// One-minute moving average rate.
    pub one_minute_rate: f64,
    /// Five-minute moving average rate.
    pub five_minute_rate: f64,
    /// Fifteen-minute moving average rate.
    pub fifteen_minute_rate: f64,
}

#[derive(Debug)]
struct MeterState {
    count: u64,
    last_tick: Instant,
    m1: Ewma,
    m5: Ewma,
    m15: Ewma,
}

impl MeterState {
    fn ewmas(&mut self) -> [&mut Ewma; 3] {
        [&mut self.m1, &mut self.m5, &mut self.m15]
    }
}

/// Measures the rate at which events occur.
///
/// # Example
///
/// ```rust
/// use instrumetrics::Meter;
///
/// let meter = Meter::default();
/// meter.mark();
/// meter.update(10);
/// assert_eq!(meter.count(), 11);
/// ```
#[derive(Debug)]
pub struct Meter {
    config: MeterConfig,
    clock: Arc<dyn Clock>,
    start_time: Instant,
    state: Mutex<MeterState>,
}

impl Meter {
    /// Creates a meter on the system clock.
    ///
    /// # Errors
    ///
    /// Returns `MetricsError::InvalidConfig` if the configuration is invalid.
    pub fn new(config: MeterConfig) -> Result<Self> {
        Self::with_clock(config, clock::system())
    }

    /// Creates a meter that reads time from `clock`.
    ///
    /// # Errors
    ///
    /// Returns `MetricsError::InvalidConfig` if the configuration is invalid.
    pub fn with_clock(config: MeterConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config, clock))
    }

    fn build(config: MeterConfig, clock: Arc<dyn Clock>) -> Self {
        let ewma = |window: fn(Duration) -> Ewma| {
            let ewma = window(config.tick_interval);
            if config.seed_rates {
                ewma.seeded()
            } else {
                ewma
            }
        };
        let start_time = clock.now();
        let state = MeterState {
            count: 0,
            last_tick: start_time,
            m1: ewma(Ewma::one_minute),
            m5: ewma(Ewma::five_minutes),
            m15: ewma(Ewma::fifteen_minutes),
        };

        Self {
            config,
            clock,
            start_time,
            state: Mutex::new(state),
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &MeterConfig {
        &self.config
    }

    /// Records one event.
    pub fn mark(&self) {
        self.update(1);
    }

    /// Records `n` events.
    pub fn update(&self, n: u64) {
        let now = self.clock.now();
        let mut state = self.state.lock();
        self.tick_if_necessary(&mut state, now);

        state.count = state.count.saturating_add(n);
        for ewma in state.ewmas() {
            ewma.update(n);
        }
    }

    /// Returns the total number of recorded events.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.state.lock().count
    }

    /// Returns the mean rate since creation, per configured rate unit.
    ///
    /// Returns `0.0` until the first event.
    #[must_use]
    pub fn mean_rate(&self) -> f64 {
        let count = self.state.lock().count;
        self.mean_rate_at(count, self.clock.now())
    }

    /// Returns the one-minute moving average rate.
    #[must_use]
    pub fn one_minute_rate(&self) -> f64 {
        self.read(|state| state.m1.rate_per(self.config.rate_unit))
    }

    /// Returns the five-minute moving average rate.
    #[must_use]
    pub fn five_minute_rate(&self) -> f64 {
        self.read(|state| state.m5.rate_per(self.config.rate_unit))
    }

    /// Returns the fifteen-minute moving average rate.
    #[must_use]
    pub fn fifteen_minute_rate(&self) -> f64 {
        self.read(|state| state.m15.rate_per(self.config.rate_unit))
    }

    /// Returns every rate under a single catch-up.
    #[must_use]
    pub fn rates(&self) -> MeterRates {
        self.count_and_rates().1
    }

    /// Returns the event count and every rate, read under one lock so the
    /// mean rate agrees with the count.
    #[must_use]
    pub fn count_and_rates(&self) -> (u64, MeterRates) {
        let now = self.clock.now();
        let mut state = self.state.lock();
        self.tick_if_necessary(&mut state, now);

        let unit = self.config.rate_unit;
        let rates = MeterRates {
            mean_rate: self.mean_rate_at(state.count, now),
            one_minute_rate: state.m1.rate_per(unit),
            five_minute_rate: state.m5.rate_per(unit),
            fifteen_minute_rate: state.m15.rate_per(unit),
        };
        (state.count, rates)
    }

    fn read(&self, f: impl FnOnce(&MeterState) -> f64) -> f64 {
        let now = self.clock.now();
        let mut state = self.state.lock();
        self.tick_if_necessary(&mut state, now);
        f(&state)
    }

    fn mean_rate_at(&self, count: u64, now: Instant) -> f64 {
        if count == 0 {
            return 0.0;
        }
        let elapsed = now.saturating_duration_since(self.start_time).as_secs_f64();
        if elapsed <= 0.0 {
            return 0.0;
        }
        count as f64 / elapsed * self.config.rate_unit.as_secs_f64()
    }

    /// Folds every tick interval that has elapsed since the last fold.
    ///
    /// `last_tick` is realigned to the most recent interval boundary. A
    /// partially elapsed interval counts as a tick, so the averages move as
    /// soon as more than one interval has passed.
    fn tick_if_necessary(&self, state: &mut MeterState, now: Instant) {
        let age = now.saturating_duration_since(state.last_tick);
        let interval = self.config.tick_interval;
        if age <= interval {
            return;
        }

        let age_nanos = age.as_nanos();
        let interval_nanos = interval.as_nanos();
        let remainder = u64::try_from(age_nanos % interval_nanos).unwrap_or(u64::MAX);
        state.last_tick = now
            .checked_sub(Duration::from_nanos(remainder))
            .unwrap_or(now);

        let ticks = u64::try_from(age_nanos.div_ceil(interval_nanos)).unwrap_or(u64::MAX);
        for ewma in state.ewmas() {
            ewma.tick_many(ticks);
        }
        trace!(ticks, "meter caught up");
    }
}

impl Default for Meter {
    fn default() -> Self {
        Self::build(MeterConfig::default(), clock::system())
    }
}
