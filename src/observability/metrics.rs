//! Metrics collection and exposition.
//!
//! # Metrics
//! - `guard_requests_total` (counter): requests by outcome (passed, rejected)
//! - `guard_rejections_total` (counter): rejections by reason
//! - `guard_lockouts_total` (counter): clients locked out
//! - `guard_csrf_tokens_issued_total` (counter)
//! - `guard_tracked_clients` (gauge): entries per map, refreshed on sweep
//! - `guard_upstream_duration_seconds` (histogram): upstream latency by status
//!
//! All functions go through the `metrics` facade and are no-ops until a
//! recorder is installed.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(outcome: &'static str) {
    metrics::counter!("guard_requests_total", "outcome" => outcome).increment(1);
}

pub fn record_rejection(reason: &'static str) {
    metrics::counter!("guard_rejections_total", "reason" => reason).increment(1);
}

pub fn record_lockout() {
    metrics::counter!("guard_lockouts_total").increment(1);
}

pub fn record_csrf_issued() {
    metrics::counter!("guard_csrf_tokens_issued_total").increment(1);
}

pub fn record_tracked_clients(windows: usize, attempts: usize) {
    metrics::gauge!("guard_tracked_clients", "map" => "rate_windows").set(windows as f64);
    metrics::gauge!("guard_tracked_clients", "map" => "login_attempts").set(attempts as f64);
}

pub fn record_upstream(status: u16, start: Instant) {
    metrics::histogram!("guard_upstream_duration_seconds", "status" => status.to_string())
        .record(start.elapsed().as_secs_f64());
}
