//! Core types for the metrics registry.
//!
//! This module provides the types that describe a registered metric:
//! - [`MetricName`]: A validated metric name
//! - [`HistogramUnits`], [`MeterUnits`], [`TimerUnits`]: Unit labels per metric kind
//! - [`Metadata`]: Free-form JSON attached at registration
//! - [`MetricKind`]: The five kinds of metric

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{MetricsError, Result};

/// Arbitrary JSON attached to a metric when it is registered.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// The kinds of metric a registry holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    /// A signed counter.
    Counter,
    /// A last-value gauge.
    Gauge,
    /// A value distribution.
    Histogram,
    /// An event rate.
    Meter,
    /// An event rate plus a duration distribution.
    Timer,
}

impl MetricKind {
    /// Returns the lowercase kind name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Counter => "counter",
            Self::Gauge => "gauge",
            Self::Histogram => "histogram",
            Self::Meter => "meter",
            Self::Timer => "timer",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated metric name.
///
/// Metric names must:
/// - Be non-empty
/// - Be at most 256 characters long
/// - Contain no control characters
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MetricName(String);

impl MetricName {
    /// Maximum allowed length for a metric name, in characters.
    pub const MAX_LENGTH: usize = 256;

    /// Creates a new validated metric name.
    ///
    /// # Errors
    ///
    /// Returns `MetricsError::InvalidMetricName` if the name is invalid.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();

        if name.is_empty() {
            return Err(MetricsError::InvalidMetricName {
                reason: "metric name cannot be empty".to_string(),
            });
        }

        if name.chars().count() > Self::MAX_LENGTH {
            return Err(MetricsError::InvalidMetricName {
                reason: format!(
                    "metric name exceeds maximum length of {} characters",
                    Self::MAX_LENGTH
                ),
            });
        }

        if let Some(c) = name.chars().find(|c| c.is_control()) {
            return Err(MetricsError::InvalidMetricName {
                reason: format!("control character {c:?} in metric name"),
            });
        }

        Ok(Self(name))
    }

    /// Returns the metric name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for MetricName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for MetricName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for MetricName {
    type Error = MetricsError;

    fn try_from(name: String) -> Result<Self> {
        Self::new(name)
    }
}

impl TryFrom<&str> for MetricName {
    type Error = MetricsError;

    fn try_from(name: &str) -> Result<Self> {
        Self::new(name)
    }
}

impl From<MetricName> for String {
    fn from(name: MetricName) -> Self {
        name.0
    }
}

fn require(metric: &MetricName, unit: &'static str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(MetricsError::MissingUnit {
            metric: metric.to_string(),
            unit,
        });
    }
    Ok(())
}

/// Checks the single unit of a counter or gauge.
pub(crate) fn validate_unit(metric: &MetricName, unit: &str) -> Result<()> {
    require(metric, "unit", unit)
}

/// Units of a histogram.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistogramUnits {
    /// Unit of the recorded values, e.g. `"ms"`.
    pub measure_unit: String,
    /// Unit of the sample count, e.g. `"req"`.
    pub sample_size_unit: String,
}

impl HistogramUnits {
    /// Creates histogram units.
    #[must_use]
    pub fn new(measure_unit: impl Into<String>, sample_size_unit: impl Into<String>) -> Self {
        Self {
            measure_unit: measure_unit.into(),
            sample_size_unit: sample_size_unit.into(),
        }
    }

    pub(crate) fn validate(&self, metric: &MetricName) -> Result<()> {
        require(metric, "measureUnit", &self.measure_unit)?;
        require(metric, "sampleSizeUnit", &self.sample_size_unit)
    }
}

/// Units of a meter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeterUnits {
    /// Unit of the reported rates, e.g. `"req/s"`.
    pub rate_unit: String,
    /// Unit of the event count, e.g. `"req"`.
    pub update_count_unit: String,
}

impl MeterUnits {
    /// Creates meter units.
    #[must_use]
    pub fn new(rate_unit: impl Into<String>, update_count_unit: impl Into<String>) -> Self {
        Self {
            rate_unit: rate_unit.into(),
            update_count_unit: update_count_unit.into(),
        }
    }

    pub(crate) fn validate(&self, metric: &MetricName) -> Result<()> {
        require(metric, "rateUnit", &self.rate_unit)?;
        require(metric, "updateCountUnit", &self.update_count_unit)
    }
}

/// Units of a timer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerUnits {
    /// Unit of the recorded durations, normally `"ms"`.
    pub measure_unit: String,
    /// Unit of the reported rates, e.g. `"req/s"`.
    pub rate_unit: String,
    /// Unit of the sample count, e.g. `"req"`.
    pub sample_size_unit: String,
}

impl TimerUnits {
    /// Creates timer units.
    #[must_use]
    pub fn new(
        measure_unit: impl Into<String>,
        rate_unit: impl Into<String>,
        sample_size_unit: impl Into<String>,
    ) -> Self {
        Self {
            measure_unit: measure_unit.into(),
            rate_unit: rate_unit.into(),
            sample_size_unit: sample_size_unit.into(),
        }
    }

    pub(crate) fn validate(&self, metric: &MetricName) -> Result<()> {
        require(metric, "measureUnit", &self.measure_unit)?;
        require(metric, "rateUnit", &self.rate_unit)?;
        require(metric, "sampleSizeUnit", &self.sample_size_unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod metric_name_tests {
        use super::*;
        use test_case::test_case;

        #[test_case("queue_depth" ; "snake case")]
        #[test_case("http.requests" ; "dotted")]
        #[test_case("latency-ms p99" ; "dashes and spaces")]
        #[test_case("züge" ; "non ascii")]
        fn valid_metric_names(raw: &str) {
            let name = MetricName::new(raw).unwrap();
            assert_eq!(name.as_str(), raw);
        }

        #[test]
        fn empty_metric_name_fails() {
            match MetricName::new("") {
                Err(MetricsError::InvalidMetricName { reason }) => {
                    assert!(reason.contains("empty"));
                }
                other => panic!("expected InvalidMetricName error, got {other:?}"),
            }
        }

        #[test]
        fn control_characters_fail() {
            assert!(MetricName::new("line\nbreak").is_err());
            assert!(MetricName::new("nul\0").is_err());
        }

        #[test]
        fn metric_name_too_long_fails() {
            let long_name = "a".repeat(MetricName::MAX_LENGTH + 1);
            match MetricName::new(long_name) {
                Err(MetricsError::InvalidMetricName { reason }) => {
                    assert!(reason.contains("maximum length"));
                }
                other => panic!("expected InvalidMetricName error, got {other:?}"),
            }
        }

        #[test]
        fn length_counts_characters_not_bytes() {
            let name = "é".repeat(MetricName::MAX_LENGTH);
            assert!(MetricName::new(name).is_ok());
        }

        #[test]
        fn metric_name_display_and_borrow() {
            let name = MetricName::new("test_metric").unwrap();
            assert_eq!(format!("{name}"), "test_metric");
            let borrowed: &str = name.borrow();
            assert_eq!(borrowed, "test_metric");
        }

        #[test]
        fn deserialization_validates() {
            let parsed: MetricName = serde_json::from_str(r#""requests""#).unwrap();
            assert_eq!(parsed.as_str(), "requests");
            assert!(serde_json::from_str::<MetricName>(r#""""#).is_err());
        }
    }

    mod unit_tests {
        use super::*;

        fn name() -> MetricName {
            MetricName::new("latency").unwrap()
        }

        #[test]
        fn complete_units_validate() {
            assert!(HistogramUnits::new("ms", "req").validate(&name()).is_ok());
            assert!(MeterUnits::new("req/s", "req").validate(&name()).is_ok());
            assert!(TimerUnits::new("ms", "req/s", "req").validate(&name()).is_ok());
            assert!(validate_unit(&name(), "req").is_ok());
        }

        #[test]
        fn missing_unit_names_the_field() {
            let err = TimerUnits::new("ms", " ", "req")
                .validate(&name())
                .unwrap_err();
            assert!(matches!(
                err,
                MetricsError::MissingUnit { unit: "rateUnit", .. }
            ));
            assert_eq!(
                err.to_string(),
                "metric 'latency' requires a non-empty rateUnit"
            );
        }

        #[test]
        fn empty_single_unit_fails() {
            assert!(matches!(
                validate_unit(&name(), ""),
                Err(MetricsError::MissingUnit { unit: "unit", .. })
            ));
        }

        #[test]
        fn units_serialize_in_camel_case() {
            let json = serde_json::to_value(MeterUnits::new("req/s", "req")).unwrap();
            assert_eq!(json["rateUnit"], "req/s");
            assert_eq!(json["updateCountUnit"], "req");
        }
    }

    #[test]
    fn kind_names() {
        assert_eq!(MetricKind::Histogram.to_string(), "histogram");
        assert_eq!(
            serde_json::to_string(&MetricKind::Timer).unwrap(),
            r#""timer""#
        );
    }
}
