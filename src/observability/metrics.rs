//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_decisions_total` (counter): gate outcomes by decision
//! - `gateway_proxy_checks_total` (counter): reputation lookups by outcome
//! - `dashboard_fetches_total` (counter): loader calls by outcome
//! - `dashboard_fetch_duration_seconds` (histogram): loader latency
//! - `dashboard_cache_entries` (gauge): cached accounts
//!
//! Without an installed recorder every call here is a no-op.

use std::net::SocketAddr;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_gate_decision(decision: &'static str) {
    metrics::counter!("gateway_decisions_total", "decision" => decision).increment(1);
}

pub fn record_proxy_check(outcome: &'static str) {
    metrics::counter!("gateway_proxy_checks_total", "outcome" => outcome).increment(1);
}

pub fn record_dashboard_fetch(outcome: &'static str, elapsed: Duration) {
    metrics::counter!("dashboard_fetches_total", "outcome" => outcome).increment(1);
    metrics::histogram!("dashboard_fetch_duration_seconds").record(elapsed.as_secs_f64());
}

pub fn record_cache_size(entries: usize) {
    metrics::gauge!("dashboard_cache_entries").set(entries as f64);
}
