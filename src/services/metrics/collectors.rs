use std::sync::Arc;
use std::time::Duration;

use super::MetricsRegistry;
use crate::services::polling::types::QueryOrigin;

/// Why a tick did or did not issue a query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Issued,
    Congested,
    Suppressed,
}

impl TickOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Issued => "issued",
            Self::Congested => "congested",
            Self::Suppressed => "suppressed",
        }
    }
}

/// Collector for polling controller metrics
#[derive(Clone)]
pub struct PollingMetricsCollector {
    metrics: Arc<MetricsRegistry>,
}

impl PollingMetricsCollector {
    pub fn new(metrics: Arc<MetricsRegistry>) -> Self {
        Self { metrics }
    }

    pub fn record_tick(&self, outcome: TickOutcome) {
        self.metrics
            .poll_ticks_total
            .with_label_values(&[outcome.as_str()])
            .inc();
    }

    pub fn set_congested(&self, congested: bool) {
        self.metrics.poll_congested.set(if congested { 1.0 } else { 0.0 });
    }

    pub fn record_query_completed(&self, origin: QueryOrigin, success: bool, elapsed: Duration) {
        let status = if success { "success" } else { "failure" };

        self.metrics
            .poll_queries_total
            .with_label_values(&[origin.as_str(), status])
            .inc();

        self.metrics
            .poll_query_duration_seconds
            .with_label_values(&[origin.as_str()])
            .observe(elapsed.as_secs_f64());
    }

    /// Completion of a query whose cycle was reset before it returned
    pub fn record_query_discarded(&self, origin: QueryOrigin) {
        self.metrics
            .poll_queries_total
            .with_label_values(&[origin.as_str(), "discarded"])
            .inc();
    }

    pub fn set_in_flight(&self, outstanding: usize) {
        self.metrics.poll_queries_in_flight.set(outstanding as f64);
    }

    pub fn set_active(&self, active: bool) {
        self.metrics.poll_active.set(if active { 1.0 } else { 0.0 });
    }

    pub fn set_suppressed(&self, suppressed: bool) {
        self.metrics.poll_suppressed.set(if suppressed { 1.0 } else { 0.0 });
    }

    pub fn set_refresh_interval(&self, seconds: u64) {
        self.metrics.poll_refresh_interval_seconds.set(seconds as f64);
    }

    pub fn record_store_operation(&self, operation: &str, success: bool) {
        self.metrics
            .state_store_operations_total
            .with_label_values(&[operation, if success { "ok" } else { "error" }])
            .inc();
    }
}
