//! Metrics collection and exposition.
//!
//! # Metrics
//! - `edge_requests_total` (counter): intercepted requests by path class, status
//! - `edge_rate_limited_total` (counter): contact requests rejected with 429
//! - `edge_contact_submissions_total` (counter): handler outcomes
//! - `edge_tracked_clients` (gauge): clients held in the rate limit ledger
//!
//! Recording is a no-op until a recorder is installed, so tests and
//! metrics-disabled deployments pay nothing.

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    let builder = PrometheusBuilder::new().with_http_listener(addr);
    match builder.install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics recorder"),
    }
}

pub fn record_request(path_class: &'static str, status: u16) {
    counter!(
        "edge_requests_total",
        "path_class" => path_class,
        "status" => status.to_string()
    )
    .increment(1);
}

pub fn record_rate_limited() {
    counter!("edge_rate_limited_total").increment(1);
}

pub fn record_contact_submission(outcome: &'static str) {
    counter!("edge_contact_submissions_total", "outcome" => outcome).increment(1);
}

pub fn record_tracked_clients(count: usize) {
    gauge!("edge_tracked_clients").set(count as f64);
}
