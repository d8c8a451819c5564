use opentelemetry::{global, trace::TracerProvider as _};
use opentelemetry_sdk::{
    propagation::TraceContextPropagator,
    trace::{Sampler, SdkTracerProvider},
    Resource,
};
use std::str::FromStr;
use tracing::Span;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log line rendering, selected with `PLACEMENT_LOG_FORMAT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// One JSON object per line with the active span stack attached.
    #[default]
    Json,
    /// Human-readable lines for local development.
    Pretty,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" | "text" => Ok(Self::Pretty),
            other => Err(format!("unknown log format `{other}` (expected json or pretty)")),
        }
    }
}

/// Holds the tracer provider; `shutdown` flushes spans still queued for export.
pub struct TelemetryGuard {
    provider: SdkTracerProvider,
}

impl TelemetryGuard {
    pub fn shutdown(self) {
        if let Err(e) = self.provider.shutdown() {
            eprintln!("failed to flush tracer provider: {e}");
        }
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn otlp_configured() -> bool {
    env_value("OTEL_EXPORTER_OTLP_ENDPOINT").is_some()
        || env_value("OTEL_EXPORTER_OTLP_TRACES_ENDPOINT").is_some()
}

fn tracer_provider(service_name: &str) -> Result<SdkTracerProvider, Box<dyn std::error::Error>> {
    let resource = Resource::builder()
        .with_service_name(service_name.to_string())
        .build();

    let builder = SdkTracerProvider::builder()
        .with_resource(resource)
        .with_sampler(Sampler::ParentBased(Box::new(Sampler::AlwaysOn)));

    // Without an exporter the provider still mints ids for log correlation.
    if !otlp_configured() {
        return Ok(builder.build());
    }

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .build()?;
    Ok(builder.with_batch_exporter(exporter).build())
}

/// Install the global subscriber and tracer provider.
///
/// `PLACEMENT_OTLP_ENDPOINT` is accepted as an alias for `OTEL_EXPORTER_OTLP_ENDPOINT`.
/// `RUST_LOG` filters events (default `info`). `log` records are bridged into tracing.
pub fn init_telemetry(service_name: &str) -> Result<TelemetryGuard, Box<dyn std::error::Error>> {
    if !otlp_configured() {
        if let Some(endpoint) = env_value("PLACEMENT_OTLP_ENDPOINT") {
            std::env::set_var("OTEL_EXPORTER_OTLP_ENDPOINT", endpoint);
        }
    }

    let format = match env_value("PLACEMENT_LOG_FORMAT") {
        Some(raw) => raw.parse::<LogFormat>()?,
        None => LogFormat::default(),
    };

    global::set_text_map_propagator(TraceContextPropagator::new());

    let provider = tracer_provider(service_name)?;
    let tracer = provider.tracer(service_name.to_string());
    global::set_tracer_provider(provider.clone());

    let json_layer = (format == LogFormat::Json).then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
    });
    let pretty_layer =
        (format == LogFormat::Pretty).then(|| tracing_subscriber::fmt::layer().pretty());

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_opentelemetry::layer().with_tracer(tracer))
        .with(json_layer)
        .with(pretty_layer)
        .try_init()?;

    // A logger may already be installed (tests).
    let _ = tracing_log::LogTracer::init();

    Ok(TelemetryGuard { provider })
}

/// Copy the OpenTelemetry trace and span ids onto `span`'s `trace_id`/`span_id` fields.
pub fn annotate_span_with_trace_ids(span: &Span) {
    use opentelemetry::trace::TraceContextExt;
    use tracing_opentelemetry::OpenTelemetrySpanExt;

    let cx = span.context();
    let otel_span = cx.span();
    let sc = otel_span.span_context();
    if sc.is_valid() {
        span.record("trace_id", tracing::field::display(sc.trace_id()));
        span.record("span_id", tracing::field::display(sc.span_id()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_format_parses_known_names() {
        assert_eq!("json".parse::<LogFormat>(), Ok(LogFormat::Json));
        assert_eq!(" Pretty ".parse::<LogFormat>(), Ok(LogFormat::Pretty));
        assert_eq!("text".parse::<LogFormat>(), Ok(LogFormat::Pretty));
        assert!("xml".parse::<LogFormat>().is_err());
    }
}
