//! Benchmarks for instrumetrics.

use std::time::Duration;

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use instrumetrics::{
    ExponentiallyDecayingReservoir, HistogramUnits, Meter, MetricFilters, MetricsRegistry,
    Reservoir, ReservoirConfig, TimerUnits, WeightedSample, WeightedSnapshot,
};

fn benchmark_reservoir_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("reservoir_update");

    for size in [128, 1028, 8192] {
        let reservoir =
            ExponentiallyDecayingReservoir::new(ReservoirConfig::new(size, 0.015).with_seed(1))
                .unwrap();
        // Fill so every update exercises the eviction path.
        for i in 0..size * 4 {
            reservoir.update(i as f64);
        }

        group.bench_with_input(BenchmarkId::from_parameter(size), &reservoir, |b, r| {
            let mut value = 0.0;
            b.iter(|| {
                value += 1.0;
                r.update(black_box(value));
            });
        });
    }

    group.finish();
}

fn benchmark_snapshot(c: &mut Criterion) {
    let samples: Vec<WeightedSample> = (0..1028)
        .map(|i| WeightedSample::new(f64::from(i % 97), 1.0 + f64::from(i) / 100.0))
        .collect();

    c.bench_function("snapshot_build_1028", |b| {
        b.iter(|| WeightedSnapshot::new(black_box(samples.clone())));
    });

    let snapshot = WeightedSnapshot::new(samples);
    c.bench_function("snapshot_percentiles", |b| {
        b.iter(|| {
            black_box(snapshot.median());
            black_box(snapshot.percentile99());
            black_box(snapshot.standard_deviation());
        });
    });
}

fn benchmark_meter_mark(c: &mut Criterion) {
    let meter = Meter::default();

    c.bench_function("meter_mark", |b| {
        b.iter(|| meter.mark());
    });
}

fn benchmark_registry_report(c: &mut Criterion) {
    let registry = MetricsRegistry::new();
    for i in 0..50 {
        registry
            .counter(&format!("counter_{i}"), "req", None)
            .unwrap()
            .update(i);
        let histogram = registry
            .histogram(&format!("histogram_{i}"), HistogramUnits::new("ms", "req"), None)
            .unwrap();
        let timer = registry
            .timer(
                &format!("timer_{i}"),
                TimerUnits::new("ms", "req/s", "req"),
                None,
            )
            .unwrap();
        for j in 0..1000 {
            histogram.update(f64::from(j));
            timer.update(Duration::from_micros(u64::try_from(j).unwrap_or(0)));
        }
    }

    c.bench_function("registry_metrics_all", |b| {
        b.iter(|| black_box(registry.metrics(&MetricFilters::all())));
    });

    let filters = MetricFilters::all()
        .with_histograms("_1")
        .unwrap()
        .with_timers("^$")
        .unwrap();
    c.bench_function("registry_metrics_filtered", |b| {
        b.iter(|| black_box(registry.metrics(&filters)));
    });
}

criterion_group!(
    benches,
    benchmark_reservoir_update,
    benchmark_snapshot,
    benchmark_meter_mark,
    benchmark_registry_report,
);
criterion_main!(benches);
