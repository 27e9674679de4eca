//! Weighted order statistics.
//!
//! A [`WeightedSnapshot`] is an immutable summary of a set of weighted
//! samples. Every statistic is weighted by sample weight rather than by
//! count, which is what lets a decaying reservoir bias its percentiles
//! towards recent observations.

use serde::{Deserialize, Serialize};

use crate::error::{MetricsError, Result};

/// A single observation and its sampling weight.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightedSample {
    /// The observed value.
    pub value: f64,
    /// The sampling weight of the observation.
    pub weight: f64,
}

impl WeightedSample {
    /// Creates a new weighted sample.
    #[must_use]
    pub const fn new(value: f64, weight: f64) -> Self {
        Self { value, weight }
    }
}

/// A point-in-time, weight-aware statistical summary.
///
/// # Example
///
/// ```rust
/// use instrumetrics::{WeightedSample, WeightedSnapshot};
///
/// let snapshot = WeightedSnapshot::new(vec![
///     WeightedSample::new(5.0, 1.0),
///     WeightedSample::new(1.0, 2.0),
///     WeightedSample::new(2.0, 3.0),
///     WeightedSample::new(3.0, 2.0),
///     WeightedSample::new(4.0, 2.0),
/// ]);
///
/// assert_eq!(snapshot.values(), &[1.0, 2.0, 3.0, 4.0, 5.0]);
/// assert_eq!(snapshot.median(), 3.0);
/// assert_eq!(snapshot.percentile75(), 4.0);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeightedSnapshot {
    /// Sample values in ascending order.
    values: Vec<f64>,
    /// Weight of each value divided by the total weight.
    normalized_weights: Vec<f64>,
    /// `boundaries[i]` is the normalized weight of all values before `i`.
    quantile_boundaries: Vec<f64>,
}

impl WeightedSnapshot {
    /// Builds a snapshot from the given samples.
    ///
    /// Samples are sorted by value; equal values keep their input order.
    #[must_use]
    pub fn new(mut samples: Vec<WeightedSample>) -> Self {
        samples.sort_by(|a, b| a.value.total_cmp(&b.value));

        // Normalize against the summed total so that tiny weights neither
        // underflow nor lose precision term by term.
        let total_weight: f64 = samples.iter().map(|s| s.weight).sum();

        let mut values = Vec::with_capacity(samples.len());
        let mut normalized_weights = Vec::with_capacity(samples.len());
        for sample in &samples {
            values.push(sample.value);
            normalized_weights.push(sample.weight / total_weight);
        }

        let mut quantile_boundaries = Vec::with_capacity(samples.len());
        if !samples.is_empty() {
            quantile_boundaries.push(0.0);
            for i in 1..samples.len() {
                quantile_boundaries.push(quantile_boundaries[i - 1] + normalized_weights[i - 1]);
            }
        }

        Self {
            values,
            normalized_weights,
            quantile_boundaries,
        }
    }

    /// Returns the value at quantile `q`.
    ///
    /// Returns `0.0` for an empty snapshot.
    ///
    /// # Errors
    ///
    /// Returns `MetricsError::InvalidQuantile` if `q` is not in `[0, 1]`.
    pub fn quantile(&self, q: f64) -> Result<f64> {
        if !(0.0..=1.0).contains(&q) {
            return Err(MetricsError::InvalidQuantile { quantile: q });
        }
        if self.values.is_empty() {
            return Ok(0.0);
        }

        let mut index = self.quantile_boundaries.partition_point(|&b| b < q);
        // Overshot unless the boundary sits exactly on q.
        if self.quantile_boundaries.get(index) != Some(&q) {
            index = index.saturating_sub(1);
        }

        Ok(self
            .values
            .get(index)
            .or_else(|| self.values.last())
            .copied()
            .unwrap_or(0.0))
    }

    /// Quantile lookup for the fixed, known-valid percentiles below.
    fn fixed_quantile(&self, q: f64) -> f64 {
        self.quantile(q).unwrap_or(0.0)
    }

    /// Returns the weighted median.
    #[must_use]
    pub fn median(&self) -> f64 {
        self.fixed_quantile(0.5)
    }

    /// Returns the weighted 75th percentile.
    #[must_use]
    pub fn percentile75(&self) -> f64 {
        self.fixed_quantile(0.75)
    }

    /// Returns the weighted 95th percentile.
    #[must_use]
    pub fn percentile95(&self) -> f64 {
        self.fixed_quantile(0.95)
    }

    /// Returns the weighted 98th percentile.
    #[must_use]
    pub fn percentile98(&self) -> f64 {
        self.fixed_quantile(0.98)
    }

    /// Returns the weighted 99th percentile.
    #[must_use]
    pub fn percentile99(&self) -> f64 {
        self.fixed_quantile(0.99)
    }

    /// Returns the weighted 99.9th percentile.
    #[must_use]
    pub fn percentile999(&self) -> f64 {
        self.fixed_quantile(0.999)
    }

    /// Returns the smallest value, or `0.0` if empty.
    #[must_use]
    pub fn min(&self) -> f64 {
        self.values.first().copied().unwrap_or(0.0)
    }

    /// Returns the largest value, or `0.0` if empty.
    #[must_use]
    pub fn max(&self) -> f64 {
        self.values.last().copied().unwrap_or(0.0)
    }

    /// Returns the weighted mean, or `0.0` if empty.
    #[must_use]
    pub fn mean(&self) -> f64 {
        self.values
            .iter()
            .zip(&self.normalized_weights)
            .map(|(value, weight)| value * weight)
            .sum()
    }

    /// Returns the weighted standard deviation.
    ///
    /// Always `0.0` for fewer than two samples.
    #[must_use]
    pub fn standard_deviation(&self) -> f64 {
        if self.values.len() <= 1 {
            return 0.0;
        }

        let mean = self.mean();
        let variance: f64 = self
            .values
            .iter()
            .zip(&self.normalized_weights)
            .map(|(value, weight)| {
                let diff = value - mean;
                weight * diff * diff
            })
            .sum();

        variance.sqrt()
    }

    /// Returns the number of samples.
    #[must_use]
    pub fn size(&self) -> usize {
        self.values.len()
    }

    /// Returns true if the snapshot holds no samples.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns the sample values in ascending order.
    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }
}
