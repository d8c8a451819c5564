use prometheus::{
    Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry,
};
use std::time::Duration;

/// Label used when a request matched no route.
pub const UNMATCHED_ROUTE: &str = "unmatched";

/// Process-wide Prometheus metrics. Cheap to clone; all handles share one registry.
#[derive(Clone)]
pub struct Metrics {
    pub registry: Registry,

    pub http_requests_total: IntCounter,
    pub http_request_duration_seconds: Histogram,
    pub http_requests_total_by_route: IntCounterVec,
    pub http_request_duration_seconds_by_route: HistogramVec,

    pub avatar_uploads_total: IntCounter,
    pub avatar_upload_bytes_total: IntCounter,
    pub avatar_downloads_total: IntCounterVec,
    pub avatar_removals_total: IntCounter,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let http_requests_total =
            IntCounter::new("http_requests_total", "Total number of HTTP requests")?;
        let http_request_duration_seconds = Histogram::with_opts(HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request latency in seconds",
        ))?;
        let http_requests_total_by_route = IntCounterVec::new(
            Opts::new(
                "http_requests_by_route_total",
                "HTTP requests by method, route and status",
            ),
            &["method", "route", "status"],
        )?;
        let http_request_duration_seconds_by_route = HistogramVec::new(
            HistogramOpts::new(
                "http_request_duration_by_route_seconds",
                "HTTP request latency by method, route and status",
            ),
            &["method", "route", "status"],
        )?;

        let avatar_uploads_total =
            IntCounter::new("avatar_uploads_total", "Avatar images stored")?;
        let avatar_upload_bytes_total =
            IntCounter::new("avatar_upload_bytes_total", "Bytes of avatar images stored")?;
        let avatar_downloads_total = IntCounterVec::new(
            Opts::new("avatar_downloads_total", "Avatar download streams opened"),
            &["variant"],
        )?;
        let avatar_removals_total =
            IntCounter::new("avatar_removals_total", "Avatar images removed")?;

        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;
        registry.register(Box::new(http_requests_total_by_route.clone()))?;
        registry.register(Box::new(http_request_duration_seconds_by_route.clone()))?;
        registry.register(Box::new(avatar_uploads_total.clone()))?;
        registry.register(Box::new(avatar_upload_bytes_total.clone()))?;
        registry.register(Box::new(avatar_downloads_total.clone()))?;
        registry.register(Box::new(avatar_removals_total.clone()))?;

        Ok(Self {
            registry,
            http_requests_total,
            http_request_duration_seconds,
            http_requests_total_by_route,
            http_request_duration_seconds_by_route,
            avatar_uploads_total,
            avatar_upload_bytes_total,
            avatar_downloads_total,
            avatar_removals_total,
        })
    }

    /// Count one finished request. `route` is the matched pattern, never the raw path,
    /// so ids in URLs do not blow up label cardinality.
    pub fn observe_request(
        &self,
        method: &str,
        route: Option<&str>,
        status: u16,
        elapsed: Duration,
    ) {
        let seconds = elapsed.as_secs_f64();
        let status = status.to_string();
        let labels = [method, route.unwrap_or(UNMATCHED_ROUTE), status.as_str()];

        self.http_requests_total.inc();
        self.http_request_duration_seconds.observe(seconds);
        self.http_requests_total_by_route
            .with_label_values(&labels)
            .inc();
        self.http_request_duration_seconds_by_route
            .with_label_values(&labels)
            .observe(seconds);
    }

    pub fn record_avatar_upload(&self, bytes: usize) {
        self.avatar_uploads_total.inc();
        self.avatar_upload_bytes_total.inc_by(bytes as u64);
    }

    pub fn record_avatar_download(&self, variant: &str) {
        self.avatar_downloads_total
            .with_label_values(&[variant])
            .inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn avatar_counters_show_up_in_exposition() {
        let metrics = Metrics::new().expect("metrics");
        metrics.record_avatar_upload(1024);
        metrics.record_avatar_download("self");
        metrics.avatar_removals_total.inc();

        let text = crate::render_metrics(&metrics.registry).expect("render");

        assert!(text.contains("avatar_uploads_total 1"));
        assert!(text.contains("avatar_upload_bytes_total 1024"));
        assert!(text.contains("avatar_downloads_total{variant=\"self\"} 1"));
        assert!(text.contains("avatar_removals_total 1"));
    }
}
