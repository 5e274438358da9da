//! # Collector
//!
//! Scrape handler backed by the `metrics` facade, installed as a recorder by
//! prometheus_metrics_handlers::Builder or used directly with [Recorder]

use super::exposition::{emit, Connection, MetricKind};
use super::registry::Handler;
use metrics::SharedString;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::error;

// Metric information stored in an index
enum MetricInfo {
    Counter(Arc<AtomicU64>),
    Gauge(Arc<AtomicU64>),
}

impl MetricInfo {
    fn kind(&self) -> MetricKind {
        match self {
            MetricInfo::Counter(_) => MetricKind::Counter,
            MetricInfo::Gauge(_) => MetricKind::Gauge,
        }
    }
}

/// Collector state used to register new metrics and scrape
/// This lives within a mutex
#[derive(Default)]
struct CollectorState {
    /// Metrics by name, emitted in name order
    metrics: BTreeMap<String, MetricInfo>,
    /// Store descriptions seperate because describe_xxx may come before or after registration
    descriptions: HashMap<String, SharedString>,
}

/// Counters and gauges recorded through the `metrics` facade
///
/// Labels and histograms are not supported; registering either logs an error and hands back a
/// no-op metric.
///
/// # Example
/// ```
/// use prometheus_metrics_handlers::{Collector, Recorder, Registry};
/// use std::sync::Arc;
///
/// let collector = Arc::new(Collector::new());
/// let recorder = Recorder::from(collector.clone());
///
/// metrics::with_local_recorder(&recorder, || {
///     metrics::describe_counter!("requests_total", "Total requests");
///     metrics::counter!("requests_total").increment(5);
/// });
///
/// let registry = Registry::new();
/// registry.register_shared(collector);
///
/// assert_eq!(
///     registry.scrape(),
///     "# TYPE requests_total counter\n# HELP requests_total Total requests\nrequests_total 5\n"
/// );
/// ```
#[derive(Default)]
pub struct Collector {
    state: Mutex<CollectorState>,
}

impl Collector {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CollectorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// update the description for a metric name, disregard what metric type it is
    fn update_description(&self, key: metrics::KeyName, description: SharedString) {
        let mut state = self.lock();

        if description.is_empty() {
            state.descriptions.remove(key.as_str());
        } else {
            state.descriptions.insert(key.as_str().to_owned(), description);
        }
    }

    /// Find or create the value cell for a metric, None if it can't be registered as `kind`
    fn register(&self, key: &metrics::Key, kind: MetricKind) -> Option<Arc<AtomicU64>> {
        if key.labels().next().is_some() {
            error!("Unable to register {kind} {key} as labels are not supported");
            return None;
        }

        let mut state = self.lock();

        // Does this metric already exist?
        if let Some(info) = state.metrics.get(key.name()) {
            return match (info, kind) {
                (MetricInfo::Counter(value), MetricKind::Counter) | (MetricInfo::Gauge(value), MetricKind::Gauge) => {
                    Some(value.clone())
                }
                (info, kind) => {
                    error!(
                        "Unable to register {kind} {key} as it was already registered as a {}",
                        info.kind()
                    );
                    None
                }
            };
        }

        let value = Arc::new(AtomicU64::new(0));
        let info = match kind {
            MetricKind::Counter => MetricInfo::Counter(value.clone()),
            MetricKind::Gauge => MetricInfo::Gauge(value.clone()),
        };
        state.metrics.insert(key.name().to_owned(), info);

        Some(value)
    }
}

impl Handler for Collector {
    fn collect(&self, conn: &mut Connection) {
        let state = self.lock();

        for (name, info) in &state.metrics {
            // HELP text falls back to the name so the line is never blank
            let description = state
                .descriptions
                .get(name)
                .map(|description| &**description)
                .unwrap_or(name);

            match info {
                MetricInfo::Counter(value) => {
                    emit(conn, MetricKind::Counter, name, description, value.load(Ordering::Relaxed));
                }
                MetricInfo::Gauge(value) => {
                    let value = f64::from_bits(value.load(Ordering::Relaxed));
                    emit(conn, MetricKind::Gauge, name, description, value);
                }
            }
        }
    }
}

/// [metrics::Recorder] feeding a [Collector]
pub struct Recorder {
    collector: Arc<Collector>,
}

impl From<Arc<Collector>> for Recorder {
    fn from(collector: Arc<Collector>) -> Self {
        Self { collector }
    }
}

impl metrics::Recorder for Recorder {
    fn describe_counter(&self, key: metrics::KeyName, _unit: Option<metrics::Unit>, description: SharedString) {
        self.collector.update_description(key, description)
    }

    fn describe_gauge(&self, key: metrics::KeyName, _unit: Option<metrics::Unit>, description: SharedString) {
        self.collector.update_description(key, description)
    }

    fn describe_histogram(&self, _key: metrics::KeyName, _unit: Option<metrics::Unit>, _description: SharedString) {}

    fn register_counter(&self, key: &metrics::Key, _metadata: &metrics::Metadata<'_>) -> metrics::Counter {
        match self.collector.register(key, MetricKind::Counter) {
            Some(value) => metrics::Counter::from_arc(value),
            None => metrics::Counter::noop(),
        }
    }

    fn register_gauge(&self, key: &metrics::Key, _metadata: &metrics::Metadata<'_>) -> metrics::Gauge {
        match self.collector.register(key, MetricKind::Gauge) {
            Some(value) => metrics::Gauge::from_arc(value),
            None => metrics::Gauge::noop(),
        }
    }

    fn register_histogram(&self, key: &metrics::Key, _metadata: &metrics::Metadata<'_>) -> metrics::Histogram {
        error!("Unable to register histogram {key} as only counters and gauges are supported");
        metrics::Histogram::noop()
    }
}
