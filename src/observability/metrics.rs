//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): proxied requests by outcome
//!   (forwarded, aborted, error)
//! - `proxy_upstream_failures_total` (counter): forwards that got no upstream response
//! - `admin_requests_total` (counter): management requests by method, status
//!
//! # Design Decisions
//! - Recording is a no-op until an exporter is installed
//! - Aborted requests are counted here even though clients never see them

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter listening on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(outcome: &'static str) {
    metrics::counter!("proxy_requests_total", "outcome" => outcome).increment(1);
}

pub fn record_upstream_failure() {
    metrics::counter!("proxy_upstream_failures_total").increment(1);
}

pub fn record_admin_request(method: &str, status: u16) {
    metrics::counter!(
        "admin_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}
