//! In-process metrics instrumentation.
#![forbid(unsafe_code)]
//!
//! `instrumetrics` lets an application register named counters, gauges,
//! histograms, meters and timers, update them from hot paths, and extract
//! point-in-time reports either on demand or through subscriptions.
//!
//! # Features
//!
//! - **Decaying reservoirs**: Histograms keep a fixed-size, forward-decaying
//!   sample so percentiles favor recent behavior
//! - **Weighted statistics**: Percentiles, mean and standard deviation are
//!   weighted by each sample's decay weight
//! - **Moving rates**: Meters report 1, 5 and 15 minute EWMA rates without
//!   storing history
//! - **Subscriptions**: Filtered, labeled reports delivered to async listeners
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//!
//! use instrumetrics::{HistogramUnits, MetricFilters, MetricsRegistry, TimerUnits};
//!
//! let registry = MetricsRegistry::new();
//!
//! let sizes = registry
//!     .histogram("response_size", HistogramUnits::new("bytes", "req"), None)
//!     .unwrap();
//! sizes.update(512.0);
//! sizes.update(2048.0);
//!
//! let latency = registry
//!     .timer("latency", TimerUnits::new("ms", "req/s", "req"), None)
//!     .unwrap();
//! latency.update(Duration::from_millis(12));
//!
//! let report = registry.metrics(&MetricFilters::all());
//! assert_eq!(report.histograms["response_size"].update_count, 2);
//! assert_eq!(report.timers["latency"].stats.max, 12.0);
//! ```

#![doc(html_root_url = "https://docs.rs/instrumetrics/0.1.0")]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod clock;
pub mod config;
pub mod counter;
pub mod error;
pub mod ewma;
pub mod gauge;
pub mod histogram;
pub mod meter;
pub mod registry;
pub mod report;
pub mod reservoir;
pub mod snapshot;
pub mod subscription;
pub mod timer;
pub mod types;

// Re-export main types at crate root
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{MeterConfig, RegistryConfig, ReservoirConfig};
pub use counter::Counter;
pub use error::{MetricsError, Result};
pub use ewma::Ewma;
pub use gauge::Gauge;
pub use histogram::Histogram;
pub use meter::{Meter, MeterRates};
pub use registry::{MetricFilters, MetricsRegistry};
pub use report::{
    CounterReport, GaugeReport, HistogramReport, MeterReport, MetricsReport, SnapshotStats,
    TimerReport,
};
pub use reservoir::{ExponentiallyDecayingReservoir, Reservoir};
pub use snapshot::{WeightedSample, WeightedSnapshot};
pub use subscription::{SubscriptionConfig, SubscriptionStream};
pub use timer::{Stopwatch, Timer};
pub use types::{HistogramUnits, Metadata, MeterUnits, MetricKind, MetricName, TimerUnits};
