//! Error types for the instrumetrics crate.

use thiserror::Error;

/// Errors that can occur in the metrics system.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// The metric name is invalid (empty or contains invalid characters).
    #[error("invalid metric name: {reason}")]
    InvalidMetricName {
        /// The reason the name is invalid.
        reason: String,
    },

    /// A unit required by the metric kind was not provided.
    #[error("metric '{metric}' requires a non-empty {unit}")]
    MissingUnit {
        /// The metric being registered.
        metric: String,
        /// The name of the missing unit field.
        unit: &'static str,
    },

    /// A quantile outside of `[0, 1]` was requested.
    #[error("{quantile} is not in [0..1]")]
    InvalidQuantile {
        /// The rejected quantile.
        quantile: f64,
    },

    /// A configuration value is out of range.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// The reason the configuration was rejected.
        reason: String,
    },

    /// A metric name filter could not be compiled.
    #[error("invalid filter: {reason}")]
    InvalidFilter {
        /// The reason the filter was rejected.
        reason: String,
    },

    /// No subscription exists with the given name.
    #[error("subscription not found: {name}")]
    SubscriptionNotFound {
        /// The subscription name that was not found.
        name: String,
    },

    /// A background task was requested outside of a Tokio runtime.
    #[error("no tokio runtime available: {reason}")]
    RuntimeUnavailable {
        /// Why the runtime could not be reached.
        reason: String,
    },
}

impl From<regex::Error> for MetricsError {
    fn from(err: regex::Error) -> Self {
        Self::InvalidFilter {
            reason: err.to_string(),
        }
    }
}

impl From<tokio::runtime::TryCurrentError> for MetricsError {
    fn from(err: tokio::runtime::TryCurrentError) -> Self {
        Self::RuntimeUnavailable {
            reason: err.to_string(),
        }
    }
}

/// Result type for metrics operations.
pub type Result<T> = std::result::Result<T, MetricsError>;
