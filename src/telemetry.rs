pub use placement_observability::{
    annotate_span_with_trace_ids, init_telemetry, render_metrics, LogFormat, Metrics,
    TelemetryGuard, PROMETHEUS_CONTENT_TYPE,
};
