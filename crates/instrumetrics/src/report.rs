//! Serializable point-in-time reports.
//!
//! A [`MetricsReport`] is what exporters consume. Field names serialize in
//! camelCase; `metadata` appears only for metrics registered with some.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::counter::Counter;
use crate::gauge::Gauge;
use crate::histogram::Histogram;
use crate::meter::{Meter, MeterRates};
use crate::snapshot::WeightedSnapshot;
use crate::timer::Timer;
use crate::types::{HistogramUnits, Metadata, MeterUnits, TimerUnits};

/// Distribution statistics shared by histogram and timer reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotStats {
    /// Largest sampled value.
    pub max: f64,
    /// Weighted mean.
    pub mean: f64,
    /// Weighted median.
    pub median: f64,
    /// Smallest sampled value.
    pub min: f64,
    /// 75th percentile.
    pub percentile75: f64,
    /// 95th percentile.
    pub percentile95: f64,
    /// 98th percentile.
    pub percentile98: f64,
    /// 99th percentile.
    pub percentile99: f64,
    /// 99.9th percentile.
    pub percentile999: f64,
    /// Weighted standard deviation.
    pub standard_deviation: f64,
}

impl From<&WeightedSnapshot> for SnapshotStats {
    fn from(snapshot: &WeightedSnapshot) -> Self {
        Self {
            max: snapshot.max(),
            mean: snapshot.mean(),
            median: snapshot.median(),
            min: snapshot.min(),
            percentile75: snapshot.percentile75(),
            percentile95: snapshot.percentile95(),
            percentile98: snapshot.percentile98(),
            percentile99: snapshot.percentile99(),
            percentile999: snapshot.percentile999(),
            standard_deviation: snapshot.standard_deviation(),
        }
    }
}

/// A counter's value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CounterReport {
    /// Current value.
    pub value: i64,
    /// Unit label.
    pub unit: String,
    /// Metadata supplied at registration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl CounterReport {
    pub(crate) fn capture(counter: &Counter, unit: &str, metadata: Option<&Metadata>) -> Self {
        Self {
            value: counter.value(),
            unit: unit.to_string(),
            metadata: metadata.cloned(),
        }
    }
}

/// A gauge's value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GaugeReport {
    /// Last set value.
    pub value: f64,
    /// Unit label.
    pub unit: String,
    /// Metadata supplied at registration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl GaugeReport {
    pub(crate) fn capture(gauge: &Gauge, unit: &str, metadata: Option<&Metadata>) -> Self {
        Self {
            value: gauge.value(),
            unit: unit.to_string(),
            metadata: metadata.cloned(),
        }
    }
}

/// A histogram's distribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistogramReport {
    /// Number of recorded values.
    pub update_count: u64,
    /// Distribution statistics.
    #[serde(flatten)]
    pub stats: SnapshotStats,
    /// Number of samples the statistics describe.
    pub sample_size: usize,
    /// Unit of the recorded values.
    pub measure_unit: String,
    /// Unit of the sample count.
    pub sample_size_unit: String,
    /// Metadata supplied at registration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl HistogramReport {
    pub(crate) fn capture(
        histogram: &Histogram,
        units: &HistogramUnits,
        metadata: Option<&Metadata>,
    ) -> Self {
        let snapshot = histogram.snapshot();
        Self {
            update_count: histogram.update_count(),
            stats: SnapshotStats::from(&snapshot),
            sample_size: snapshot.size(),
            measure_unit: units.measure_unit.clone(),
            sample_size_unit: units.sample_size_unit.clone(),
            metadata: metadata.cloned(),
        }
    }
}

/// A meter's rates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeterReport {
    /// Number of recorded events.
    pub update_count: u64,
    /// Mean and moving average rates.
    #[serde(flatten)]
    pub rates: MeterRates,
    /// Unit of the rates.
    pub rate_unit: String,
    /// Unit of the event count.
    pub update_count_unit: String,
    /// Metadata supplied at registration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl MeterReport {
    pub(crate) fn capture(meter: &Meter, units: &MeterUnits, metadata: Option<&Metadata>) -> Self {
        let (update_count, rates) = meter.count_and_rates();
        Self {
            update_count,
            rates,
            rate_unit: units.rate_unit.clone(),
            update_count_unit: units.update_count_unit.clone(),
            metadata: metadata.cloned(),
        }
    }
}

/// A timer's rates and duration distribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerReport {
    /// Number of recorded events.
    pub update_count: u64,
    /// Mean and moving average rates.
    #[serde(flatten)]
    pub rates: MeterRates,
    /// Duration statistics.
    #[serde(flatten)]
    pub stats: SnapshotStats,
    /// Number of samples the statistics describe.
    pub sample_size: usize,
    /// Unit of the recorded durations.
    pub measure_unit: String,
    /// Unit of the rates.
    pub rate_unit: String,
    /// Unit of the sample count.
    pub sample_size_unit: String,
    /// Metadata supplied at registration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl TimerReport {
    pub(crate) fn capture(timer: &Timer, units: &TimerUnits, metadata: Option<&Metadata>) -> Self {
        let (update_count, rates) = timer.count_and_rates();
        let snapshot = timer.snapshot();
        Self {
            update_count,
            rates,
            stats: SnapshotStats::from(&snapshot),
            sample_size: snapshot.size(),
            measure_unit: units.measure_unit.clone(),
            rate_unit: units.rate_unit.clone(),
            sample_size_unit: units.sample_size_unit.clone(),
            metadata: metadata.cloned(),
        }
    }
}

/// Every selected metric of a registry, captured together.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsReport {
    /// Label of the subscription that produced the report.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Counters by name.
    pub counters: BTreeMap<String, CounterReport>,
    /// Gauges by name.
    pub gauges: BTreeMap<String, GaugeReport>,
    /// Histograms by name.
    pub histograms: BTreeMap<String, HistogramReport>,
    /// Meters by name.
    pub meters: BTreeMap<String, MeterReport>,
    /// Timers by name.
    pub timers: BTreeMap<String, TimerReport>,
    /// Milliseconds spent building the report.
    pub latency: f64,
}

impl MetricsReport {
    /// Returns true if no metric was selected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
            && self.gauges.is_empty()
            && self.histograms.is_empty()
            && self.meters.is_empty()
            && self.timers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::{Value, json};

    use super::*;
    use crate::clock::ManualClock;
    use crate::config::MeterConfig;

    fn keys(value: &Value) -> Vec<&str> {
        let mut keys: Vec<&str> = value
            .as_object()
            .map(|object| object.keys().map(String::as_str).collect())
            .unwrap_or_default();
        keys.sort_unstable();
        keys
    }

    fn metadata() -> Metadata {
        let Value::Object(map) = json!({"team": "edge"}) else {
            unreachable!()
        };
        map
    }

    #[test]
    fn histogram_report_fields() {
        let histogram = Histogram::default();
        histogram.update(2.0);
        histogram.update(4.0);

        let report = HistogramReport::capture(&histogram, &HistogramUnits::new("ms", "req"), None);
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(
            keys(&json),
            [
                "max",
                "mean",
                "measureUnit",
                "median",
                "min",
                "percentile75",
                "percentile95",
                "percentile98",
                "percentile99",
                "percentile999",
                "sampleSize",
                "sampleSizeUnit",
                "standardDeviation",
                "updateCount",
            ]
        );
        assert_eq!(json["updateCount"], 2);
        assert_eq!(json["sampleSize"], 2);
        assert_eq!(json["max"], 4.0);
    }

    #[test]
    fn meter_report_fields() {
        let meter = Meter::default();
        meter.update(3);

        let report = MeterReport::capture(&meter, &MeterUnits::new("req/s", "req"), None);
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(
            keys(&json),
            [
                "fifteenMinuteRate",
                "fiveMinuteRate",
                "meanRate",
                "oneMinuteRate",
                "rateUnit",
                "updateCount",
                "updateCountUnit",
            ]
        );
        assert_eq!(json["updateCount"], 3);
    }

    #[test]
    fn meter_report_count_matches_mean_rate_under_load() {
        let clock = ManualClock::new();
        let meter = Meter::with_clock(MeterConfig::default(), Arc::new(clock.clone())).unwrap();
        clock.advance(Duration::from_secs(10));
        let units = MeterUnits::new("req/s", "req");

        std::thread::scope(|scope| {
            scope.spawn(|| {
                for _ in 0..20_000 {
                    meter.mark();
                }
            });
            for _ in 0..200 {
                let report = MeterReport::capture(&meter, &units, None);
                let expected = report.update_count as f64 / 10.0;
                assert!((report.rates.mean_rate - expected).abs() < 1e-9);
            }
        });
    }

    #[test]
    fn timer_report_fields() {
        let timer = Timer::default();
        timer.update(Duration::from_millis(10));

        let units = TimerUnits::new("ms", "req/s", "req");
        let json = serde_json::to_value(TimerReport::capture(&timer, &units, None)).unwrap();

        assert_eq!(keys(&json).len(), 19);
        for key in ["meanRate", "percentile999", "sampleSize", "measureUnit", "rateUnit"] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
        assert_eq!(json["max"], 10.0);
    }

    #[test]
    fn metadata_is_only_serialized_when_present() {
        let counter = Counter::new();
        counter.update(4);

        let bare = serde_json::to_value(CounterReport::capture(&counter, "req", None)).unwrap();
        assert_eq!(keys(&bare), ["unit", "value"]);

        let meta = metadata();
        let tagged =
            serde_json::to_value(CounterReport::capture(&counter, "req", Some(&meta))).unwrap();
        assert_eq!(tagged["metadata"]["team"], "edge");
        assert_eq!(tagged["value"], 4);
    }

    #[test]
    fn gauge_report_reads_value() {
        let gauge = Gauge::new();
        gauge.update(0.25);
        let report = GaugeReport::capture(&gauge, "ratio", None);
        assert!((report.value - 0.25).abs() < f64::EPSILON);
        assert_eq!(report.unit, "ratio");
    }

    #[test]
    fn empty_report_shape() {
        let report = MetricsReport::default();
        assert!(report.is_empty());

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(
            keys(&json),
            ["counters", "gauges", "histograms", "latency", "meters", "timers"]
        );
    }

    #[test]
    fn report_deserializes_from_json() {
        let json = json!({
            "label": "edge",
            "counters": {"hits": {"value": 3, "unit": "req"}},
            "gauges": {},
            "histograms": {},
            "meters": {},
            "timers": {},
            "latency": 0.5
        });
        let report: MetricsReport = serde_json::from_value(json).unwrap();
        assert_eq!(report.label.as_deref(), Some("edge"));
        assert_eq!(report.counters["hits"].value, 3);
    }
}
