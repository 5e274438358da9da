use axum::{routing::get, Router};
use prometheus_metrics_handlers::{emit, service::MetricsLayer, Builder, Config, Connection, Error, MetricKind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::info;

async fn hello() -> &'static str {
    metrics::counter!("hello_requests_total").increment(1);
    "hello\n"
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::filter::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    // METRICS_CONFIG replaces the defaults entirely
    let builder = match std::env::var("METRICS_CONFIG") {
        Ok(json) => Builder::new().with_config(Config::from_json(&json)?),
        Err(_) => Builder::new().with_uptime_metric("process_uptime_seconds").with_recorder(),
    };

    // Application state reported by its own handler
    let connections = Arc::new(AtomicU64::new(0));
    let reported = connections.clone();

    let registry = builder
        .with_handler(move |conn: &mut Connection| {
            emit(
                conn,
                MetricKind::Gauge,
                "demo_open_connections",
                "Connections currently open",
                reported.load(Ordering::Relaxed),
            )
        })
        .init()?;

    metrics::describe_counter!("hello_requests_total", "Requests served by the hello route");
    connections.store(1, Ordering::Relaxed);

    let app = Router::new().route("/", get(hello)).layer(MetricsLayer::new(registry));

    let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
    info!("serving metrics on http://{}{}", listener.local_addr()?, registry.config.endpoint_path);

    axum::serve(listener, app).await?;
    Ok(())
}
