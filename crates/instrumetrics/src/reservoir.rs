//! Sample reservoirs.
//!
//! A [`Reservoir`] keeps a bounded sample of a value stream and turns it
//! into a [`WeightedSnapshot`] on demand. The provided implementation,
//! [`ExponentiallyDecayingReservoir`], uses forward-decaying priority
//! sampling: every observation is weighted by `exp(alpha * t)` where `t` is
//! the time since the reservoir's landmark, so the retained sample is biased
//! towards recent behavior while its size stays fixed.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use rand::distributions::Standard;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::clock::{self, Clock};
use crate::config::ReservoirConfig;
use crate::error::Result;
use crate::snapshot::{WeightedSample, WeightedSnapshot};

/// Largest weight exponent `alpha * t` allowed before an early rescale.
///
/// `exp` overflows past about 709.78; the margin leaves room for the
/// `1 / draw` priority factor (at most 2^53) and for summing weights.
const MAX_WEIGHT_EXPONENT: f64 = 600.0;

/// A bounded sample store backing a histogram.
pub trait Reservoir: Debug + Send + Sync {
    /// Records a value.
    fn update(&self, value: f64);

    /// Returns the number of samples the next snapshot will describe.
    fn size(&self) -> usize;

    /// Returns a snapshot of the current sample.
    fn snapshot(&self) -> WeightedSnapshot;
}

/// A live sample with its eviction priority.
///
/// Ordered by priority, then by insertion sequence, so two samples never
/// compare equal.
#[derive(Debug, Clone, Copy)]
struct Entry {
    priority: f64,
    seq: u64,
    sample: WeightedSample,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .total_cmp(&other.priority)
            .then(self.seq.cmp(&other.seq))
    }
}

#[derive(Debug)]
struct State {
    /// Min-heap: the root is the next eviction candidate.
    entries: BinaryHeap<Reverse<Entry>>,
    count: u64,
    next_seq: u64,
    start_time: Instant,
    next_rescale_time: Instant,
    rng: StdRng,
}

/// A forward-decaying priority reservoir.
///
/// # Example
///
/// ```rust
/// use instrumetrics::{ExponentiallyDecayingReservoir, Reservoir, ReservoirConfig};
///
/// let reservoir = ExponentiallyDecayingReservoir::new(ReservoirConfig::new(100, 0.015)).unwrap();
/// for i in 0..1000 {
///     reservoir.update(f64::from(i));
/// }
///
/// assert_eq!(reservoir.size(), 100);
/// assert_eq!(reservoir.snapshot().size(), 100);
/// ```
#[derive(Debug)]
pub struct ExponentiallyDecayingReservoir {
    config: ReservoirConfig,
    clock: Arc<dyn Clock>,
    state: Mutex<State>,
}

impl ExponentiallyDecayingReservoir {
    /// Creates a reservoir on the system clock.
    ///
    /// # Errors
    ///
    /// Returns `MetricsError::InvalidConfig` if the configuration is invalid.
    pub fn new(config: ReservoirConfig) -> Result<Self> {
        Self::with_clock(config, clock::system())
    }

    /// Creates a reservoir that reads time from `clock`.
    ///
    /// # Errors
    ///
    /// Returns `MetricsError::InvalidConfig` if the configuration is invalid.
    pub fn with_clock(config: ReservoirConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config, clock))
    }

    fn build(config: ReservoirConfig, clock: Arc<dyn Clock>) -> Self {
        let rng = config
            .seed
            .map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);
        let start_time = clock.now();
        let state = State {
            entries: BinaryHeap::with_capacity(config.size),
            count: 0,
            next_seq: 0,
            start_time,
            next_rescale_time: start_time + config.rescale_interval,
            rng,
        };

        Self {
            config,
            clock,
            state: Mutex::new(state),
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &ReservoirConfig {
        &self.config
    }

    /// Returns how many observations have been accepted since creation or
    /// since the last rescale.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.state.lock().count
    }

    fn weight(&self, since_start_secs: f64) -> f64 {
        (self.config.alpha * since_start_secs).exp()
    }

    /// Renormalizes every weight and priority against a new landmark.
    ///
    /// Scaling preserves relative order. Priorities that collapse onto the
    /// same value (the factor underflowed) carry no ordering information any
    /// more; only the most recently inserted of them is kept.
    fn rescale(&self, state: &mut State, now: Instant) {
        let old_start = state.start_time;
        state.start_time = now;
        state.next_rescale_time = now + self.config.rescale_interval;

        let elapsed = now.saturating_duration_since(old_start).as_secs_f64();
        let factor = (-self.config.alpha * elapsed).exp();

        let mut entries: Vec<Entry> = std::mem::take(&mut state.entries)
            .into_iter()
            .map(|Reverse(mut entry)| {
                entry.priority *= factor;
                entry.sample.weight *= factor;
                entry
            })
            .collect();
        let before = entries.len();

        entries.sort_by(|a, b| a.priority.total_cmp(&b.priority).then(b.seq.cmp(&a.seq)));
        entries.dedup_by(|later, kept| later.priority == kept.priority);

        state.count = entries.len() as u64;
        state.entries = entries.into_iter().map(Reverse).collect();

        debug!(
            factor,
            retained = state.entries.len(),
            collapsed = before - state.entries.len(),
            "rescaled decaying reservoir"
        );
    }
}

impl Reservoir for ExponentiallyDecayingReservoir {
    fn update(&self, value: f64) {
        let now = self.clock.now();
        let mut state = self.state.lock();

        let exponent =
            self.config.alpha * now.saturating_duration_since(state.start_time).as_secs_f64();
        if now >= state.next_rescale_time || exponent > MAX_WEIGHT_EXPONENT {
            self.rescale(&mut state, now);
        }

        let since_start = now.saturating_duration_since(state.start_time).as_secs_f64();
        let weight = self.weight(since_start);
        // Uniform in (0, 1].
        let draw: f64 = 1.0 - state.rng.sample::<f64, _>(Standard);
        let priority = weight / draw;

        state.count += 1;
        let seq = state.next_seq;
        state.next_seq += 1;
        let entry = Entry {
            priority,
            seq,
            sample: WeightedSample::new(value, weight),
        };

        if state.entries.len() < self.config.size {
            state.entries.push(Reverse(entry));
            return;
        }

        let beats_minimum = state
            .entries
            .peek()
            .is_some_and(|Reverse(min)| priority > min.priority);
        if beats_minimum {
            state.entries.pop();
            state.entries.push(Reverse(entry));
        }
    }

    fn size(&self) -> usize {
        let count = self.state.lock().count;
        usize::try_from(count).map_or(self.config.size, |count| count.min(self.config.size))
    }

    fn snapshot(&self) -> WeightedSnapshot {
        let samples: Vec<WeightedSample> = {
            let state = self.state.lock();
            state.entries.iter().map(|Reverse(entry)| entry.sample).collect()
        };
        WeightedSnapshot::new(samples)
    }
}

impl Default for ExponentiallyDecayingReservoir {
    fn default() -> Self {
        Self::build(ReservoirConfig::default(), clock::system())
    }
}
