//! Metrics collection and exposition.
//!
//! # Metrics
//! - `waf_requests_total` (counter): requests by method, status, domain
//! - `waf_request_duration_seconds` (histogram): latency distribution
//! - `waf_blocked_total` (counter): blocks by reason
//! - `waf_counter_store_errors_total` (counter): rate limit store faults
//! - `waf_log_entries_dropped_total` (counter): sink overflow drops
//!
//! # Design Decisions
//! - Low-overhead updates (atomic operations behind the metrics crate)
//! - Prometheus exposition on its own bind address

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

/// Install the Prometheus exporter on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter started"),
        Err(e) => tracing::error!(error = %e, "Failed to start metrics exporter"),
    }
}

/// Record one completed request.
pub fn record_request(method: &str, status: u16, domain: &str, start: Instant) {
    metrics::counter!(
        "waf_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "domain" => domain.to_string(),
    )
    .increment(1);
    metrics::histogram!("waf_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

/// Record one blocked request.
pub fn record_blocked(reason: &str) {
    metrics::counter!("waf_blocked_total", "reason" => reason.to_string()).increment(1);
}
