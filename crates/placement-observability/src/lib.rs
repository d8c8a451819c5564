//! Metrics, tracing and storage instrumentation shared by the placement crates.

pub mod metrics;
pub mod storage;
pub mod telemetry;

#[cfg(feature = "actix")]
pub mod actix;

pub use metrics::Metrics;
pub use storage::ObservedStorage;
pub use telemetry::{annotate_span_with_trace_ids, init_telemetry, LogFormat, TelemetryGuard};

/// Content type of the Prometheus text format produced by [`render_metrics`].
pub const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// Gather every family in `registry` as Prometheus text.
pub fn render_metrics(registry: &prometheus::Registry) -> Result<String, prometheus::Error> {
    prometheus::TextEncoder::new().encode_to_string(&registry.gather())
}
