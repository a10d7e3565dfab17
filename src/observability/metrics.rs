//! Metrics collection and exposition.
//!
//! # Metrics
//! - `scs_requests_total` (counter): requests by method, status
//! - `scs_request_duration_seconds` (histogram): latency distribution
//! - `scs_auth_failures_total` (counter): failed credential checks
//! - `scs_secrets_served_total` (counter): secret references resolved
//!
//! # Design Decisions
//! - Low-overhead metric updates (atomic operations)
//! - The exporter binds a separate address so the scrape endpoint never
//!   passes through the access-control pipeline

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter on the given address.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => {
            tracing::info!(address = %addr, "Metrics exporter listening");
        }
        Err(err) => {
            tracing::error!(address = %addr, error = %err, "Failed to install metrics exporter");
        }
    }
}

/// Record one completed request.
pub fn record_request(method: &str, status: u16, start: Instant) {
    let labels = [
        ("method", method.to_string()),
        ("status", status.to_string()),
    ];
    metrics::counter!("scs_requests_total", &labels).increment(1);
    metrics::histogram!("scs_request_duration_seconds", &labels)
        .record(start.elapsed().as_secs_f64());
}

/// Record one failed credential check.
pub fn record_auth_failure() {
    metrics::counter!("scs_auth_failures_total").increment(1);
}

/// Record secret references resolved for a served configuration.
pub fn record_secrets_served(count: usize) {
    metrics::counter!("scs_secrets_served_total").increment(count as u64);
}
