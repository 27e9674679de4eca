//! Periodically publishes a filtered metrics report and prints it as JSON.
//!
//! Run with: RUST_LOG=instrumetrics=debug cargo run -p instrumetrics --example subscriber

use std::io;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use serde_json::json;
use tracing_subscriber::EnvFilter;

use instrumetrics::{
    HistogramUnits, MeterUnits, MetricFilters, MetricsRegistry, SubscriptionConfig, TimerUnits,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let registry = Arc::new(MetricsRegistry::new());

    let requests = registry.meter(
        "http.requests",
        MeterUnits::new("req/s", "req"),
        json!({"service": "demo"}).as_object().cloned(),
    )?;
    let sizes = registry.histogram(
        "http.response_size",
        HistogramUnits::new("bytes", "req"),
        None,
    )?;
    let latency = registry.timer("http.latency", TimerUnits::new("ms", "req/s", "req"), None)?;
    let in_flight = registry.gauge("http.in_flight", "req", None)?;

    let name = registry.subscribe(
        SubscriptionConfig::new()
            .filters(MetricFilters::all().with_gauges("^$")?)
            .label("demo"),
    );
    let mut reports = registry.listen(&name)?;
    let publisher = registry.spawn_publisher(&name, Duration::from_secs(1))?;

    let load = tokio::spawn(async move {
        for i in 0..200_u32 {
            requests.mark();
            sizes.update(f64::from(256 + (i * 37) % 4096));
            in_flight.update(f64::from(i % 8));
            let stopwatch = latency.start();
            tokio::time::sleep(Duration::from_millis(u64::from(5 + i % 10))).await;
            drop(stopwatch);
        }
    });

    for _ in 0..3 {
        let Some(report) = reports.next().await else {
            break;
        };
        println!("{}", serde_json::to_string_pretty(report.as_ref())?);
    }

    registry.unsubscribe(&name);
    publisher.await?;
    load.await?;
    Ok(())
}
