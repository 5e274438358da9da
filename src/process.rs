//! Built-in handlers describing the running process

use super::exposition::{emit, Connection, MetricKind};
use super::registry::Handler;
use std::time::Instant;

/// Whole seconds since the handler was created, reported as a counter
pub struct Uptime {
    name: String,
    started: Instant,
}

impl Uptime {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            started: Instant::now(),
        }
    }
}

impl Handler for Uptime {
    fn collect(&self, conn: &mut Connection) {
        emit(
            conn,
            MetricKind::Counter,
            &self.name,
            "Seconds since the metrics registry was initialized",
            self.started.elapsed().as_secs(),
        );
    }
}
