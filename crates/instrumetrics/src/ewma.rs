//! Exponentially weighted moving average rate estimation.
//!
//! An [`Ewma`] accumulates event counts between ticks and, on each tick,
//! folds the interval's instantaneous rate into a running average with
//! `alpha = 1 - exp(-tick / window)`. No history is stored.

use std::time::Duration;

/// Window of the one-minute moving average.
pub const ONE_MINUTE: Duration = Duration::from_secs(60);

/// Window of the five-minute moving average.
pub const FIVE_MINUTES: Duration = Duration::from_secs(5 * 60);

/// Window of the fifteen-minute moving average.
pub const FIFTEEN_MINUTES: Duration = Duration::from_secs(15 * 60);

/// A tick-driven exponentially weighted moving average of an event rate.
///
/// Not synchronized; owners guard it (see [`Meter`](crate::Meter)).
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
///
/// use instrumetrics::Ewma;
///
/// let mut ewma = Ewma::one_minute(Duration::from_secs(5)).seeded();
/// ewma.update(3);
/// ewma.tick();
/// assert!((ewma.rate() - 0.6).abs() < 1e-9);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Ewma {
    alpha: f64,
    interval_secs: f64,
    /// Events per second.
    rate: f64,
    uncounted: u64,
    initialized: bool,
    seed_on_first_tick: bool,
}

impl Ewma {
    /// Creates an average over `window`, folded every `tick_interval`.
    #[must_use]
    pub fn new(window: Duration, tick_interval: Duration) -> Self {
        let interval_secs = tick_interval.as_secs_f64();
        let alpha = 1.0 - (-interval_secs / window.as_secs_f64()).exp();
        Self {
            alpha,
            interval_secs,
            rate: 0.0,
            uncounted: 0,
            initialized: false,
            seed_on_first_tick: false,
        }
    }

    /// Creates a one-minute average.
    #[must_use]
    pub fn one_minute(tick_interval: Duration) -> Self {
        Self::new(ONE_MINUTE, tick_interval)
    }

    /// Creates a five-minute average.
    #[must_use]
    pub fn five_minutes(tick_interval: Duration) -> Self {
        Self::new(FIVE_MINUTES, tick_interval)
    }

    /// Creates a fifteen-minute average.
    #[must_use]
    pub fn fifteen_minutes(tick_interval: Duration) -> Self {
        Self::new(FIFTEEN_MINUTES, tick_interval)
    }

    /// Makes the first tick adopt the observed rate outright instead of
    /// decaying towards it from zero.
    #[must_use]
    pub const fn seeded(mut self) -> Self {
        self.seed_on_first_tick = true;
        self
    }

    /// Records `n` events in the current interval.
    pub const fn update(&mut self, n: u64) {
        self.uncounted = self.uncounted.saturating_add(n);
    }

    /// Folds the current interval into the average.
    pub fn tick(&mut self) {
        let instant_rate = self.uncounted as f64 / self.interval_secs;
        self.uncounted = 0;

        if !self.initialized && self.seed_on_first_tick {
            self.rate = instant_rate;
        } else {
            self.rate += self.alpha * (instant_rate - self.rate);
        }
        self.initialized = true;
    }

    /// Applies `ticks` consecutive ticks.
    ///
    /// Only the first tick sees pending events; the rest are pure decay and
    /// are applied in one step.
    pub fn tick_many(&mut self, ticks: u64) {
        if ticks == 0 {
            return;
        }
        self.tick();
        if ticks > 1 {
            self.rate *= (1.0 - self.alpha).powf((ticks - 1) as f64);
        }
    }

    /// Returns the average rate in events per second.
    #[must_use]
    pub const fn rate(&self) -> f64 {
        self.rate
    }

    /// Returns the average rate in events per `unit`.
    #[must_use]
    pub fn rate_per(&self, unit: Duration) -> f64 {
        self.rate * unit.as_secs_f64()
    }

    /// Returns the per-tick decay factor.
    #[must_use]
    pub const fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Returns true once at least one tick has been applied.
    #[must_use]
    pub const fn is_initialized(&self) -> bool {
        self.initialized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TICK: Duration = Duration::from_secs(5);

    fn elapse_minute(ewma: &mut Ewma) {
        for _ in 0..12 {
            ewma.tick();
        }
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-6,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn alpha_follows_window_and_interval() {
        assert_close(Ewma::one_minute(TICK).alpha(), 1.0 - (-5.0f64 / 60.0).exp());
        assert_close(Ewma::five_minutes(TICK).alpha(), 1.0 - (-5.0f64 / 300.0).exp());
        assert_close(Ewma::fifteen_minutes(TICK).alpha(), 1.0 - (-5.0f64 / 900.0).exp());
    }

    #[test]
    fn update_does_not_move_rate_until_tick() {
        let mut ewma = Ewma::one_minute(TICK);
        ewma.update(100);
        assert!(ewma.rate().abs() < f64::EPSILON);
        assert!(!ewma.is_initialized());

        ewma.tick();
        assert!(ewma.rate() > 0.0);
        assert!(ewma.is_initialized());
    }

    #[test]
    fn unseeded_first_tick_decays_from_zero() {
        let mut ewma = Ewma::one_minute(TICK);
        ewma.update(3);
        ewma.tick();
        assert_close(ewma.rate(), 0.6 * ewma.alpha());
    }

    #[test]
    fn seeded_one_minute_rate_decays_over_a_minute() {
        let mut ewma = Ewma::one_minute(TICK).seeded();
        ewma.update(3);
        ewma.tick();
        assert_close(ewma.rate(), 0.6);

        elapse_minute(&mut ewma);
        assert_close(ewma.rate(), 0.220_727_66);

        elapse_minute(&mut ewma);
        assert_close(ewma.rate(), 0.081_201_16);
    }

    #[test]
    fn seeded_five_minute_rate_decays_over_a_minute() {
        let mut ewma = Ewma::five_minutes(TICK).seeded();
        ewma.update(3);
        ewma.tick();
        assert_close(ewma.rate(), 0.6);

        elapse_minute(&mut ewma);
        assert_close(ewma.rate(), 0.491_238_45);
    }

    #[test]
    fn seeded_fifteen_minute_rate_decays_over_a_minute() {
        let mut ewma = Ewma::fifteen_minutes(TICK).seeded();
        ewma.update(3);
        ewma.tick();
        assert_close(ewma.rate(), 0.6);

        elapse_minute(&mut ewma);
        assert_close(ewma.rate(), 0.561_304_19);
    }

    #[test]
    fn tick_many_matches_repeated_ticks() {
        let mut stepped = Ewma::one_minute(TICK);
        let mut jumped = stepped.clone();
        stepped.update(42);
        jumped.update(42);

        for _ in 0..30 {
            stepped.tick();
        }
        jumped.tick_many(30);

        assert_close(stepped.rate(), jumped.rate());
    }

    #[test]
    fn tick_many_zero_is_a_no_op() {
        let mut ewma = Ewma::one_minute(TICK);
        ewma.update(5);
        ewma.tick_many(0);
        assert!(!ewma.is_initialized());
        ewma.tick();
        assert_close(ewma.rate(), ewma.alpha());
    }

    #[test]
    fn rate_per_scales_units() {
        let mut ewma = Ewma::one_minute(TICK).seeded();
        ewma.update(10);
        ewma.tick();
        assert_close(ewma.rate_per(Duration::from_secs(1)), 2.0);
        assert_close(ewma.rate_per(Duration::from_secs(60)), 120.0);
        assert_close(ewma.rate_per(Duration::from_millis(1)), 0.002);
    }
}
