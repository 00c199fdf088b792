//! Metrics and observability for OpSignal
#![allow(clippy::must_use_candidate)]

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::Arc;
use std::time::Instant;

/// Global metrics registry
static METRICS: once_cell::sync::Lazy<Arc<MetricsRegistry>> =
    once_cell::sync::Lazy::new(|| Arc::new(MetricsRegistry::new()));

/// Install the recorder and start the uptime clock. Anything recorded
/// before this runs goes to the no-op recorder and is lost, so call it
/// at process startup.
pub fn init() {
    once_cell::sync::Lazy::force(&METRICS);
}

/// Metrics registry for OpSignal
pub struct MetricsRegistry {
    start_time: Instant,
    prometheus: Option<PrometheusHandle>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        // Install fails when a recorder is already set (extra registries in
        // tests); exposition then carries the uptime line alone.
        let prometheus = PrometheusBuilder::new().install_recorder().ok();
        Self {
            start_time: Instant::now(),
            prometheus,
        }
    }

    /// Get the global metrics registry
    pub fn global() -> Arc<MetricsRegistry> {
        Arc::clone(&METRICS)
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> f64 {
        self.start_time.elapsed().as_secs_f64()
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Ingestion Metrics
// ============================================================================

/// Record the outcome of one ingestion batch
pub fn record_ingest_batch(accepted: u64, failed: u64) {
    counter!("opsignal_signals_ingested_total").increment(accepted);
    counter!("opsignal_signals_failed_total").increment(failed);
    counter!("opsignal_ingest_batches_total").increment(1);
}

// ============================================================================
// Query Metrics
// ============================================================================

/// Record query executed
pub fn record_query(query_type: &str, success: bool) {
    let status = if success { "success" } else { "error" };
    counter!("opsignal_queries_total",
        "type" => query_type.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record query latency
pub fn record_query_latency(query_type: &str, latency_ms: f64) {
    histogram!("opsignal_query_duration_ms", "type" => query_type.to_string()).record(latency_ms);
}

/// Record rows scanned during a store scan
pub fn record_rows_scanned(count: u64) {
    counter!("opsignal_rows_scanned_total").increment(count);
}

// ============================================================================
// Export Functions
// ============================================================================

/// Export metrics in Prometheus format
#[must_use]
pub fn export_prometheus() -> String {
    let registry = MetricsRegistry::global();
    let uptime = format!(
        "# HELP opsignal_uptime_seconds Server uptime in seconds\n\
         # TYPE opsignal_uptime_seconds gauge\n\
         opsignal_uptime_seconds {}\n",
        registry.uptime_secs()
    );

    match &registry.prometheus {
        Some(handle) => format!("{uptime}{}", handle.render()),
        None => uptime,
    }
}
