//! Signed event counters.

use std::sync::atomic::{AtomicI64, Ordering};

/// A signed counter updated by deltas.
///
/// # Example
///
/// ```rust
/// use instrumetrics::Counter;
///
/// let in_flight = Counter::default();
/// in_flight.increment();
/// in_flight.update(5);
/// in_flight.decrement();
/// assert_eq!(in_flight.value(), 5);
/// ```
#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicI64,
}

impl Counter {
    /// Creates a counter at zero.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            value: AtomicI64::new(0),
        }
    }

    /// Adds `delta`, which may be negative.
    pub fn update(&self, delta: i64) {
        self.value.fetch_add(delta, Ordering::Relaxed);
    }

    /// Adds one.
    pub fn increment(&self) {
        self.update(1);
    }

    /// Subtracts one.
    pub fn decrement(&self) {
        self.update(-1);
    }

    /// Sets the counter back to zero and returns the value it held.
    pub fn reset(&self) -> i64 {
        self.value.swap(0, Ordering::Relaxed)
    }

    /// Returns the current value.
    #[must_use]
    pub fn value(&self) -> i64 {
        self.value.load(Ordering::Relaxed)
    }
}
