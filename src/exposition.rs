//! # Exposition
//!
//! Writes metrics in the Prometheus text exposition format
//!
//! <https://prometheus.io/docs/instrumenting/exposition_formats/#text-based-format>

use bytes::{Bytes, BytesMut};
use std::fmt::{self, Display, Write as _};
use tracing::error;

/// Kind of a metric, written on its `# TYPE` line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKind {
    /// An absolute value that can go up or down
    Gauge,
    /// A monotonically increasing value
    Counter,
}

impl MetricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Gauge => "gauge",
            MetricKind::Counter => "counter",
        }
    }
}

impl Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outbound side of a scrape connection
///
/// Append-only; the buffer is handed to the HTTP response with [Connection::freeze] once every
/// handler has run.
#[derive(Debug, Default)]
pub struct Connection {
    buf: BytesMut,
}

impl Connection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    /// Number of bytes written so far
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Consume the connection, returning everything written to it
    pub fn freeze(self) -> Bytes {
        self.buf.freeze()
    }
}

impl fmt::Write for Connection {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.buf.extend_from_slice(s.as_bytes());
        Ok(())
    }
}

impl std::io::Write for Connection {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Write one metric to the connection
///
/// # Example
/// ```
/// use prometheus_metrics_handlers::{emit, Connection, MetricKind};
///
/// let mut conn = Connection::new();
/// emit(&mut conn, MetricKind::Counter, "number_of_requests", "My Description", 1234);
///
/// assert_eq!(
///     conn.as_bytes(),
///     b"# TYPE number_of_requests counter\n\
///       ## HELP number_of_requests My Description\n\
///       number_of_requests 1234\n"
/// );
/// ```
///
/// * `name` and `description` are written verbatim, they must not contain newlines
/// * `value` is rendered through its [Display] implementation
/// * Emitting the same name twice writes two blocks, nothing is merged
pub fn emit(conn: &mut Connection, kind: MetricKind, name: &str, description: &str, value: impl Display) {
    let result = write!(
        conn,
        "# TYPE {name} {kind}\n# HELP {name} {description}\n{name} {value}\n"
    );

    if let Err(err) = result {
        error!("Failed to format value of metric {name}: {err}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(conn: &Connection) -> Vec<&str> {
        std::str::from_utf8(conn.as_bytes()).unwrap().lines().collect()
    }

    #[test]
    fn counter_block() {
        let mut conn = Connection::new();
        emit(&mut conn, MetricKind::Counter, "requests_total", "Total requests", 5u32);

        assert_eq!(
            lines(&conn),
            [
                "# TYPE requests_total counter",
                "# HELP requests_total Total requests",
                "requests_total 5",
            ]
        );
    }

    #[test]
    fn gauge_block() {
        let mut conn = Connection::new();
        emit(&mut conn, MetricKind::Gauge, "temp_celsius", "Current temp", format!("{:.1}", 21.5));

        assert_eq!(
            lines(&conn),
            [
                "# TYPE temp_celsius gauge",
                "# HELP temp_celsius Current temp",
                "temp_celsius 21.5",
            ]
        );
    }

    #[test]
    fn duplicates_are_not_merged() {
        let mut conn = Connection::new();
        emit(&mut conn, MetricKind::Gauge, "heap_free", "Free heap", 1024);
        emit(&mut conn, MetricKind::Gauge, "heap_free", "Free heap", 512);

        assert_eq!(
            std::str::from_utf8(conn.as_bytes()).unwrap(),
            "# TYPE heap_free gauge\n# HELP heap_free Free heap\nheap_free 1024\n\
             # TYPE heap_free gauge\n# HELP heap_free Free heap\nheap_free 512\n"
        );
    }

    #[test]
    fn failing_value_is_not_fatal() {
        struct Broken;

        impl Display for Broken {
            fn fmt(&self, _f: &mut fmt::Formatter<'_>) -> fmt::Result {
                Err(fmt::Error)
            }
        }

        let mut conn = Connection::new();
        emit(&mut conn, MetricKind::Gauge, "broken", "Never renders", Broken);
        emit(&mut conn, MetricKind::Counter, "after", "Still written", 1);

        assert!(std::str::from_utf8(conn.as_bytes()).unwrap().ends_with("after 1\n"));
    }

    #[test]
    fn raw_writes_append() {
        use std::io::Write;

        let mut conn = Connection::with_capacity(64);
        assert!(conn.is_empty());

        conn.write_all(b"# comment\n").unwrap();
        emit(&mut conn, MetricKind::Counter, "c", "d", 0);

        assert_eq!(conn.len(), conn.as_bytes().len());
        assert!(conn.freeze().starts_with(b"# comment\n# TYPE c counter\n"));
    }
}
