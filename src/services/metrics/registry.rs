use prometheus::{
    CounterVec, Encoder, Gauge, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

const NAMESPACE: &str = "alert_poller";

/// Central metrics registry for the poller
pub struct MetricsRegistry {
    registry: Registry,

    // HTTP Metrics
    pub http_requests_total: CounterVec,
    pub http_request_duration_seconds: HistogramVec,

    // Polling Metrics
    pub poll_ticks_total: CounterVec,
    pub poll_queries_total: CounterVec,
    pub poll_query_duration_seconds: HistogramVec,
    pub poll_queries_in_flight: Gauge,
    pub poll_active: Gauge,
    pub poll_congested: Gauge,
    pub poll_suppressed: Gauge,
    pub poll_refresh_interval_seconds: Gauge,

    // State Store Metrics
    pub state_store_operations_total: CounterVec,
}

impl MetricsRegistry {
    pub fn new() -> Result<Arc<Self>, Box<dyn std::error::Error>> {
        let registry = Registry::new();

        // HTTP Metrics
        let http_requests_total = CounterVec::new(
            Opts::new("http_requests_total", "Total HTTP requests").namespace(NAMESPACE),
            &["method", "endpoint", "status"],
        )?;
        registry.register(Box::new(http_requests_total.clone()))?;

        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new("http_request_duration_seconds", "HTTP request duration")
                .namespace(NAMESPACE)
                .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]),
            &["method", "endpoint"],
        )?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;

        // Polling Metrics
        let poll_ticks_total = CounterVec::new(
            Opts::new("poll_ticks_total", "Timer ticks by outcome (issued, congested, suppressed)")
                .namespace(NAMESPACE),
            &["outcome"],
        )?;
        registry.register(Box::new(poll_ticks_total.clone()))?;

        let poll_queries_total = CounterVec::new(
            Opts::new("poll_queries_total", "Completed search queries").namespace(NAMESPACE),
            &["origin", "status"],
        )?;
        registry.register(Box::new(poll_queries_total.clone()))?;

        let poll_query_duration_seconds = HistogramVec::new(
            HistogramOpts::new("poll_query_duration_seconds", "Search query duration")
                .namespace(NAMESPACE)
                .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]),
            &["origin"],
        )?;
        registry.register(Box::new(poll_query_duration_seconds.clone()))?;

        let poll_queries_in_flight = Gauge::with_opts(
            Opts::new("poll_queries_in_flight", "Search queries currently outstanding")
                .namespace(NAMESPACE),
        )?;
        registry.register(Box::new(poll_queries_in_flight.clone()))?;

        let poll_active = Gauge::with_opts(
            Opts::new("poll_active", "Polling state (0=stopped, 1=active)").namespace(NAMESPACE),
        )?;
        registry.register(Box::new(poll_active.clone()))?;

        let poll_congested = Gauge::with_opts(
            Opts::new("poll_congested", "Congestion detected on the last tick")
                .namespace(NAMESPACE),
        )?;
        registry.register(Box::new(poll_congested.clone()))?;

        let poll_suppressed = Gauge::with_opts(
            Opts::new("poll_suppressed", "Issuance suppressed by the operator")
                .namespace(NAMESPACE),
        )?;
        registry.register(Box::new(poll_suppressed.clone()))?;

        let poll_refresh_interval_seconds = Gauge::with_opts(
            Opts::new("poll_refresh_interval_seconds", "Configured refresh interval")
                .namespace(NAMESPACE),
        )?;
        registry.register(Box::new(poll_refresh_interval_seconds.clone()))?;

        // State Store Metrics
        let state_store_operations_total = CounterVec::new(
            Opts::new("state_store_operations_total", "State store operations")
                .namespace(NAMESPACE),
            &["operation", "result"],
        )?;
        registry.register(Box::new(state_store_operations_total.clone()))?;

        Ok(Arc::new(Self {
            registry,
            http_requests_total,
            http_request_duration_seconds,
            poll_ticks_total,
            poll_queries_total,
            poll_query_duration_seconds,
            poll_queries_in_flight,
            poll_active,
            poll_congested,
            poll_suppressed,
            poll_refresh_interval_seconds,
            state_store_operations_total,
        }))
    }

    /// Export metrics in Prometheus text format
    pub fn export(&self) -> Result<String, Box<dyn std::error::Error>> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }

    /// Get the underlying registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}
