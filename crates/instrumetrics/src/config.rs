//! Configuration for reservoirs, meters and the registry.
//!
//! Every tunable that shapes sampling or rate estimation lives here with a
//! named default. The structs deserialize with `#[serde(default)]`, so a
//! partial JSON document only overrides the fields it names.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{MetricsError, Result};

/// Default number of samples kept by a decaying reservoir.
pub const DEFAULT_RESERVOIR_SIZE: usize = 1028;

/// Default decay rate of a decaying reservoir, per second.
pub const DEFAULT_ALPHA: f64 = 0.015;

/// How often a decaying reservoir renormalizes its weights.
pub const DEFAULT_RESCALE_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// How often meter rates are folded.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(5);

/// The unit meter rates are reported in.
pub const DEFAULT_RATE_UNIT: Duration = Duration::from_secs(1);

/// Default broadcast capacity of a subscription.
pub const DEFAULT_SUBSCRIPTION_BUFFER: usize = 64;

/// Configuration for an [`ExponentiallyDecayingReservoir`](crate::ExponentiallyDecayingReservoir).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReservoirConfig {
    /// Maximum number of retained samples.
    pub size: usize,
    /// Exponential decay rate; larger values bias harder towards recent samples.
    pub alpha: f64,
    /// Interval between weight renormalizations.
    pub rescale_interval: Duration,
    /// Seed for the priority draws. `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl Default for ReservoirConfig {
    fn default() -> Self {
        Self {
            size: DEFAULT_RESERVOIR_SIZE,
            alpha: DEFAULT_ALPHA,
            rescale_interval: DEFAULT_RESCALE_INTERVAL,
            seed: None,
        }
    }
}

impl ReservoirConfig {
    /// Creates a configuration with the given size and alpha.
    #[must_use]
    pub fn new(size: usize, alpha: f64) -> Self {
        Self {
            size,
            alpha,
            ..Default::default()
        }
    }

    /// Returns this configuration with a fixed seed.
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Checks that every field is in range.
    ///
    /// # Errors
    ///
    /// Returns `MetricsError::InvalidConfig` describing the first bad field.
    pub fn validate(&self) -> Result<()> {
        if self.size == 0 {
            return Err(MetricsError::InvalidConfig {
                reason: "reservoir size must be greater than zero".to_string(),
            });
        }
        if !self.alpha.is_finite() || self.alpha <= 0.0 {
            return Err(MetricsError::InvalidConfig {
                reason: format!("reservoir alpha must be positive and finite, got {}", self.alpha),
            });
        }
        if self.rescale_interval.is_zero() {
            return Err(MetricsError::InvalidConfig {
                reason: "rescale interval must be non-zero".to_string(),
            });
        }
        Ok(())
    }
}

/// Configuration for a [`Meter`](crate::Meter).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeterConfig {
    /// Interval at which the moving averages are folded.
    pub tick_interval: Duration,
    /// Unit the reported rates are expressed in.
    pub rate_unit: Duration,
    /// Seed each moving average with the first observed rate instead of
    /// decaying towards it from zero.
    pub seed_rates: bool,
}

impl Default for MeterConfig {
    fn default() -> Self {
        Self {
            tick_interval: DEFAULT_TICK_INTERVAL,
            rate_unit: DEFAULT_RATE_UNIT,
            seed_rates: false,
        }
    }
}

impl MeterConfig {
    /// Checks that every field is in range.
    ///
    /// # Errors
    ///
    /// Returns `MetricsError::InvalidConfig` describing the first bad field.
    pub fn validate(&self) -> Result<()> {
        if self.tick_interval.is_zero() {
            return Err(MetricsError::InvalidConfig {
                reason: "tick interval must be non-zero".to_string(),
            });
        }
        if self.rate_unit.is_zero() {
            return Err(MetricsError::InvalidConfig {
                reason: "rate unit must be non-zero".to_string(),
            });
        }
        Ok(())
    }
}

/// Configuration for a [`MetricsRegistry`](crate::MetricsRegistry).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Reservoir settings for every histogram and timer.
    pub reservoir: ReservoirConfig,
    /// Meter settings for every meter and timer.
    pub meter: MeterConfig,
    /// Number of undelivered reports a subscription buffers per listener.
    pub subscription_buffer: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            reservoir: ReservoirConfig::default(),
            meter: MeterConfig::default(),
            subscription_buffer: DEFAULT_SUBSCRIPTION_BUFFER,
        }
    }
}

impl RegistryConfig {
    /// Checks every nested configuration.
    ///
    /// # Errors
    ///
    /// Returns `MetricsError::InvalidConfig` describing the first bad field.
    pub fn validate(&self) -> Result<()> {
        self.reservoir.validate()?;
        self.meter.validate()?;
        if self.subscription_buffer == 0 {
            return Err(MetricsError::InvalidConfig {
                reason: "subscription buffer must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}
