use criterion::{criterion_group, criterion_main, Criterion};
use prometheus_metrics_handlers::{emit, Connection, MetricKind};

fn criterion_benchmark(c: &mut Criterion) {
    let registry = prometheus_metrics_handlers::Builder::new()
        .with_uptime_metric("process_uptime_seconds")
        .with_recorder()
        .with_handler(|conn: &mut Connection| {
            emit(conn, MetricKind::Gauge, "temp_celsius", "Current temp", 21.5);
            emit(conn, MetricKind::Gauge, "wifi_rssi", "Signal strength", -61);
        })
        .init()
        .unwrap();

    metrics::counter!("requests_total").increment(1);
    metrics::counter!("errors_total").increment(1);
    metrics::gauge!("heap_free_bytes").set(20480.0);

    c.bench_function("scrape", |b| b.iter(|| registry.scrape()));
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
