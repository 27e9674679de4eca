//! Name-keyed metric registry.
//!
//! [`MetricsRegistry`] hands out shared handles to named metrics, creating
//! them on first use, and captures filtered [`MetricsReport`]s of
//! everything it holds.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use regex::Regex;
use tracing::debug;

use crate::clock::{self, Clock};
use crate::config::RegistryConfig;
use crate::counter::Counter;
use crate::error::Result;
use crate::gauge::Gauge;
use crate::histogram::Histogram;
use crate::meter::Meter;
use crate::report::{
    CounterReport, GaugeReport, HistogramReport, MeterReport, MetricsReport, TimerReport,
};
use crate::subscription::Subscription;
use crate::timer::Timer;
use crate::types::{
    self, HistogramUnits, Metadata, MeterUnits, MetricKind, MetricName, TimerUnits,
};

/// Per-kind name filters for a report.
///
/// A kind without a filter includes every name. A kind with a filter
/// includes the names the regex matches anywhere in.
#[derive(Debug, Clone, Default)]
pub struct MetricFilters {
    /// Filter for counter names.
    pub counters: Option<Regex>,
    /// Filter for gauge names.
    pub gauges: Option<Regex>,
    /// Filter for histogram names.
    pub histograms: Option<Regex>,
    /// Filter for meter names.
    pub meters: Option<Regex>,
    /// Filter for timer names.
    pub timers: Option<Regex>,
}

impl MetricFilters {
    /// Creates filters that include everything.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Restricts counters to names matching `pattern`.
    ///
    /// # Errors
    ///
    /// Returns `MetricsError::InvalidFilter` if `pattern` is not a valid regex.
    pub fn with_counters(mut self, pattern: &str) -> Result<Self> {
        self.counters = Some(Regex::new(pattern)?);
        Ok(self)
    }

    /// Restricts gauges to names matching `pattern`.
    ///
    /// # Errors
    ///
    /// Returns `MetricsError::InvalidFilter` if `pattern` is not a valid regex.
    pub fn with_gauges(mut self, pattern: &str) -> Result<Self> {
        self.gauges = Some(Regex::new(pattern)?);
        Ok(self)
    }

    /// Restricts histograms to names matching `pattern`.
    ///
    /// # Errors
    ///
    /// Returns `MetricsError::InvalidFilter` if `pattern` is not a valid regex.
    pub fn with_histograms(mut self, pattern: &str) -> Result<Self> {
        self.histograms = Some(Regex::new(pattern)?);
        Ok(self)
    }

    /// Restricts meters to names matching `pattern`.
    ///
    /// # Errors
    ///
    /// Returns `MetricsError::InvalidFilter` if `pattern` is not a valid regex.
    pub fn with_meters(mut self, pattern: &str) -> Result<Self> {
        self.meters = Some(Regex::new(pattern)?);
        Ok(self)
    }

    /// Restricts timers to names matching `pattern`.
    ///
    /// # Errors
    ///
    /// Returns `MetricsError::InvalidFilter` if `pattern` is not a valid regex.
    pub fn with_timers(mut self, pattern: &str) -> Result<Self> {
        self.timers = Some(Regex::new(pattern)?);
        Ok(self)
    }
}

fn selected(filter: Option<&Regex>, name: &MetricName) -> bool {
    filter.is_none_or(|regex| regex.is_match(name.as_str()))
}

/// A registered metric with the units and metadata it was created with.
#[derive(Debug)]
struct Registered<M, U> {
    metric: Arc<M>,
    units: U,
    metadata: Option<Metadata>,
}

type Table<M, U> = RwLock<BTreeMap<MetricName, Registered<M, U>>>;

/// Returns the metric registered under `name`, creating it if absent.
///
/// Units and metadata of a repeat registration are ignored.
fn get_or_create<M, U>(
    table: &Table<M, U>,
    kind: MetricKind,
    name: MetricName,
    units: U,
    metadata: Option<Metadata>,
    create: impl FnOnce() -> Result<M>,
) -> Result<Arc<M>> {
    if let Some(existing) = table.read().get(&name) {
        return Ok(Arc::clone(&existing.metric));
    }

    let mut table = table.write();
    if let Some(existing) = table.get(&name) {
        return Ok(Arc::clone(&existing.metric));
    }

    let metric = Arc::new(create()?);
    debug!(
        kind = %kind,
        metric = %name,
        has_metadata = metadata.is_some(),
        "registered metric"
    );
    table.insert(
        name,
        Registered {
            metric: Arc::clone(&metric),
            units,
            metadata,
        },
    );
    Ok(metric)
}

fn capture<M, U, R>(
    table: &Table<M, U>,
    filter: Option<&Regex>,
    report: impl Fn(&M, &U, Option<&Metadata>) -> R,
) -> BTreeMap<String, R> {
    table
        .read()
        .iter()
        .filter(|(name, _)| selected(filter, name))
        .map(|(name, entry)| {
            let captured = report(&entry.metric, &entry.units, entry.metadata.as_ref());
            (name.to_string(), captured)
        })
        .collect()
}

/// Thread-safe registry of named metrics.
///
/// Registration is idempotent: asking for a name that already exists
/// returns the existing metric. Each metric kind has its own namespace.
///
/// # Example
///
/// ```rust
/// use instrumetrics::{MetricFilters, MetricsRegistry, TimerUnits};
///
/// let registry = MetricsRegistry::new();
/// let hits = registry.counter("hits", "req", None).unwrap();
/// hits.increment();
///
/// let latency = registry
///     .timer("latency", TimerUnits::new("ms", "req/s", "req"), None)
///     .unwrap();
/// latency.time(|| ());
///
/// let report = registry.metrics(&MetricFilters::all());
/// assert_eq!(report.counters["hits"].value, 1);
/// assert_eq!(report.timers["latency"].update_count, 1);
/// ```
#[derive(Debug)]
pub struct MetricsRegistry {
    pub(crate) config: RegistryConfig,
    clock: Arc<dyn Clock>,
    counters: Table<Counter, String>,
    gauges: Table<Gauge, String>,
    histograms: Table<Histogram, HistogramUnits>,
    meters: Table<Meter, MeterUnits>,
    timers: Table<Timer, TimerUnits>,
    pub(crate) subscriptions: RwLock<HashMap<String, Subscription>>,
}

impl MetricsRegistry {
    /// Creates a registry with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::build(RegistryConfig::default(), clock::system())
    }

    /// Creates a registry with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns `MetricsError::InvalidConfig` if the configuration is invalid.
    pub fn with_config(config: RegistryConfig) -> Result<Self> {
        Self::with_clock(config, clock::system())
    }

    /// Creates a registry whose metrics read time from `clock`.
    ///
    /// # Errors
    ///
    /// Returns `MetricsError::InvalidConfig` if the configuration is invalid.
    pub fn with_clock(config: RegistryConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config, clock))
    }

    fn build(config: RegistryConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            counters: RwLock::default(),
            gauges: RwLock::default(),
            histograms: RwLock::default(),
            meters: RwLock::default(),
            timers: RwLock::default(),
            subscriptions: RwLock::default(),
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Returns the counter named `name`, creating it if absent.
    ///
    /// # Errors
    ///
    /// Returns `MetricsError::InvalidMetricName` for an invalid name and
    /// `MetricsError::MissingUnit` for an empty unit.
    pub fn counter(
        &self,
        name: &str,
        unit: &str,
        metadata: Option<Metadata>,
    ) -> Result<Arc<Counter>> {
        let name = MetricName::new(name)?;
        types::validate_unit(&name, unit)?;
        get_or_create(
            &self.counters,
            MetricKind::Counter,
            name,
            unit.to_string(),
            metadata,
            || Ok(Counter::new()),
        )
    }

    /// Returns the gauge named `name`, creating it if absent.
    ///
    /// # Errors
    ///
    /// Returns `MetricsError::InvalidMetricName` for an invalid name and
    /// `MetricsError::MissingUnit` for an empty unit.
    pub fn gauge(&self, name: &str, unit: &str, metadata: Option<Metadata>) -> Result<Arc<Gauge>> {
        let name = MetricName::new(name)?;
        types::validate_unit(&name, unit)?;
        get_or_create(
            &self.gauges,
            MetricKind::Gauge,
            name,
            unit.to_string(),
            metadata,
            || Ok(Gauge::new()),
        )
    }

    /// Returns the histogram named `name`, creating it if absent.
    ///
    /// # Errors
    ///
    /// Returns `MetricsError::InvalidMetricName` for an invalid name and
    /// `MetricsError::MissingUnit` for an empty unit.
    pub fn histogram(
        &self,
        name: &str,
        units: HistogramUnits,
        metadata: Option<Metadata>,
    ) -> Result<Arc<Histogram>> {
        let name = MetricName::new(name)?;
        units.validate(&name)?;
        get_or_create(
            &self.histograms,
            MetricKind::Histogram,
            name,
            units,
            metadata,
            || Histogram::with_clock(self.config.reservoir.clone(), Arc::clone(&self.clock)),
        )
    }

    /// Returns the meter named `name`, creating it if absent.
    ///
    /// # Errors
    ///
    /// Returns `MetricsError::InvalidMetricName` for an invalid name and
    /// `MetricsError::MissingUnit` for an empty unit.
    pub fn meter(
        &self,
        name: &str,
        units: MeterUnits,
        metadata: Option<Metadata>,
    ) -> Result<Arc<Meter>> {
        let name = MetricName::new(name)?;
        units.validate(&name)?;
        get_or_create(
            &self.meters,
            MetricKind::Meter,
            name,
            units,
            metadata,
            || Meter::with_clock(self.config.meter.clone(), Arc::clone(&self.clock)),
        )
    }

    /// Returns the timer named `name`, creating it if absent.
    ///
    /// # Errors
    ///
    /// Returns `MetricsError::InvalidMetricName` for an invalid name and
    /// `MetricsError::MissingUnit` for an empty unit.
    pub fn timer(
        &self,
        name: &str,
        units: TimerUnits,
        metadata: Option<Metadata>,
    ) -> Result<Arc<Timer>> {
        let name = MetricName::new(name)?;
        units.validate(&name)?;
        get_or_create(
            &self.timers,
            MetricKind::Timer,
            name,
            units,
            metadata,
            || {
                Timer::with_clock(
                    self.config.reservoir.clone(),
                    self.config.meter.clone(),
                    Arc::clone(&self.clock),
                )
            },
        )
    }

    /// Captures every metric selected by `filters`.
    ///
    /// `latency` is the wall-clock time spent building the report.
    #[must_use]
    pub fn metrics(&self, filters: &MetricFilters) -> MetricsReport {
        let started = Instant::now();

        let mut report = MetricsReport {
            label: None,
            counters: capture(
                &self.counters,
                filters.counters.as_ref(),
                |counter, unit, metadata| CounterReport::capture(counter, unit, metadata),
            ),
            gauges: capture(
                &self.gauges,
                filters.gauges.as_ref(),
                |gauge, unit, metadata| GaugeReport::capture(gauge, unit, metadata),
            ),
            histograms: capture(
                &self.histograms,
                filters.histograms.as_ref(),
                HistogramReport::capture,
            ),
            meters: capture(&self.meters, filters.meters.as_ref(), MeterReport::capture),
            timers: capture(&self.timers, filters.timers.as_ref(), TimerReport::capture),
            latency: 0.0,
        };
        report.latency = started.elapsed().as_secs_f64() * 1000.0;
        report
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}
