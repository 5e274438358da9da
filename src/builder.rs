use super::{collector, process, registry, Error};
use std::sync::Arc;
use tracing::debug;

/// Builder for the metrics Registry
///
/// # Example
/// ```
///  use prometheus_metrics_handlers::{emit, Connection, MetricKind};
///
///  let registry = prometheus_metrics_handlers::Builder::new()
///      .endpoint_path("/metrics")
///      .with_uptime_metric("process_uptime_seconds")
///      .with_handler(|conn: &mut Connection| {
///          emit(conn, MetricKind::Gauge, "temp_celsius", "Current temp", 21.5)
///      })
///      .init()
///      .unwrap();
///
///  assert_eq!(registry.len(), 2);
/// ```
pub struct Builder {
    config: registry::Config,
    handlers: Vec<Arc<dyn registry::Handler>>,
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

impl Builder {
    pub fn new() -> Self {
        Builder {
            config: Default::default(),
            handlers: Default::default(),
        }
    }

    /// Replaces the whole configuration, e.g. one loaded with [Config::from_json](registry::Config::from_json)
    /// * Handlers added with [Builder::with_handler] are kept
    pub fn with_config(self, config: registry::Config) -> Self {
        Self { config, ..self }
    }

    /// Sets the path the HTTP layer answers scrapes on, defaults to `/metrics`
    /// * Must start with '/' or init() will return Err("endpoint_path must start with '/'")
    pub fn endpoint_path(mut self, path: impl Into<String>) -> Self {
        self.config.endpoint_path = path.into();
        self
    }

    /// Reports the seconds since init() as a counter with the given name
    pub fn with_uptime_metric(mut self, name: impl Into<String>) -> Self {
        self.config.uptime_metric = Some(name.into());
        self
    }

    /// Installs a [Collector](collector::Collector) as the global `metrics` recorder so
    /// `metrics::counter!` and `metrics::gauge!` show up on every scrape
    /// * Fails in init() if a global recorder was already installed
    pub fn with_recorder(mut self) -> Self {
        self.config.install_recorder = true;
        self
    }

    /// Adds a scrape handler, handlers run in the order they were added
    pub fn with_handler(mut self, handler: impl registry::Handler + 'static) -> Self {
        self.handlers.push(Arc::new(handler));
        self
    }

    /// Adds a scrape handler that is also referenced elsewhere
    pub fn with_shared_handler(mut self, handler: Arc<dyn registry::Handler>) -> Self {
        self.handlers.push(handler);
        self
    }

    /// Private helper for consuming the builder into a registry and optional recorder
    fn build(self) -> Result<(registry::Registry, Option<collector::Recorder>), Error> {
        if !self.config.endpoint_path.starts_with('/') {
            return Err("endpoint_path must start with '/'".into());
        }

        let uptime = self.config.uptime_metric.clone();
        let install_recorder = self.config.install_recorder;
        let registry = registry::Registry::with_config(self.config);

        if let Some(name) = uptime {
            registry.register(process::Uptime::new(name));
        }

        let recorder = if install_recorder {
            let collector = Arc::new(collector::Collector::new());
            registry.register_shared(collector.clone());
            Some(collector::Recorder::from(collector))
        } else {
            None
        };

        for handler in self.handlers {
            registry.register_shared(handler);
        }

        Ok((registry, recorder))
    }

    /// Intialize the registry including the call to metrics::set_global_recorder when requested
    ///
    /// The registry lives for the rest of the process so the HTTP layer can borrow it freely
    pub fn init(self) -> Result<&'static registry::Registry, Error> {
        let (registry, recorder) = self.build()?;

        if let Some(recorder) = recorder {
            metrics::set_global_recorder(recorder).map_err(|_| "a global metrics recorder is already installed")?;
        }

        debug!(
            endpoint_path = %registry.config.endpoint_path,
            handlers = registry.len(),
            "metrics registry initialized"
        );

        Ok(Box::leak(Box::new(registry)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exposition::{emit, Connection, MetricKind};

    #[test]
    fn rejects_relative_path() {
        let err = Builder::new().endpoint_path("metrics").init().err().unwrap();
        assert_eq!(err.to_string(), "endpoint_path must start with '/'");
    }

    #[test]
    fn builtins_run_before_user_handlers() {
        let registry = Builder::new()
            .with_handler(|conn: &mut Connection| emit(conn, MetricKind::Gauge, "app", "Application", 1))
            .with_uptime_metric("uptime_seconds")
            .init()
            .unwrap();

        let body = String::from_utf8(registry.scrape().to_vec()).unwrap();
        let types: Vec<&str> = body.lines().filter(|l| l.starts_with("# TYPE")).collect();

        assert_eq!(types, ["# TYPE uptime_seconds counter", "# TYPE app gauge"]);
    }

    #[test]
    fn config_replaces_settings() {
        let config = registry::Config::from_json(r#"{"endpoint_path":"/prometheus"}"#).unwrap();
        let registry = Builder::new()
            .with_uptime_metric("ignored")
            .with_config(config)
            .init()
            .unwrap();

        assert_eq!(registry.config.endpoint_path, "/prometheus");
        assert!(registry.is_empty());
    }
}
