//! # Registry
//!
//! Ordered list of handlers invoked each time the /metrics endpoint is scraped

use super::{exposition::Connection, Error};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

/// Configuration via Builder or deserialized from JSON
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Path answered by the HTTP layer
    pub endpoint_path: String,
    /// Name of the built-in uptime counter, not registered when `None`
    pub uptime_metric: Option<String>,
    /// Install a [Collector](super::Collector) as the global `metrics` recorder
    pub install_recorder: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint_path: "/metrics".into(),
            uptime_metric: None,
            install_recorder: false,
        }
    }
}

impl Config {
    /// Parse a configuration document, missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Called on every scrape to write zero or more metrics to the connection
///
/// Closures implement this directly, capturing whatever state they report on:
/// ```
/// use prometheus_metrics_handlers::{emit, Connection, MetricKind, Registry};
/// use std::sync::atomic::{AtomicU64, Ordering};
/// use std::sync::Arc;
///
/// let requests = Arc::new(AtomicU64::new(0));
/// let registry = Registry::new();
///
/// let counted = requests.clone();
/// registry.register(move |conn: &mut Connection| {
///     emit(conn, MetricKind::Counter, "requests_total", "Total requests", counted.load(Ordering::Relaxed));
/// });
///
/// requests.fetch_add(3, Ordering::Relaxed);
/// assert!(registry.scrape().ends_with(b"requests_total 3\n"));
/// ```
pub trait Handler: Send + Sync {
    fn collect(&self, conn: &mut Connection);
}

impl<F> Handler for F
where
    F: Fn(&mut Connection) + Send + Sync,
{
    fn collect(&self, conn: &mut Connection) {
        self(conn)
    }
}

/// Append-only list of scrape handlers
///
/// Construct one at startup (directly or via [Builder](super::Builder)) and hand a reference to
/// the HTTP layer.
pub struct Registry {
    handlers: Mutex<Vec<Arc<dyn Handler>>>,
    pub config: Config,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        Self {
            handlers: Mutex::new(Vec::new()),
            config,
        }
    }

    /// Append a handler, it runs after every handler registered before it
    /// * There is no way to unregister a handler
    /// * The same handler may be registered more than once
    pub fn register(&self, handler: impl Handler + 'static) -> &Self {
        self.register_shared(Arc::new(handler))
    }

    /// Append a handler that is also referenced elsewhere
    pub fn register_shared(&self, handler: Arc<dyn Handler>) -> &Self {
        self.lock().push(handler);
        self
    }

    /// Number of registered handlers
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Invoke every handler, in registration order, against the connection
    ///
    /// Called by the HTTP layer once per scrape. Handlers run without the registry lock held, so a
    /// handler registered while a scrape is in progress first runs on the next scrape.
    pub fn on_scrape(&self, conn: &mut Connection) {
        let handlers = self.lock().clone();
        let start = conn.len();

        for handler in &handlers {
            handler.collect(conn);
        }

        // A handler may have replaced the connection wholesale
        let written = conn.len().saturating_sub(start);
        debug!(handlers = handlers.len(), bytes = written, "metrics scrape complete");
    }

    /// Run a scrape against a fresh connection and return the document
    pub fn scrape(&self) -> Bytes {
        let mut conn = Connection::new();
        self.on_scrape(&mut conn);
        conn.freeze()
    }

    // Handlers are never run under the lock, so a poisoned list is still whole
    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Arc<dyn Handler>>> {
        self.handlers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
