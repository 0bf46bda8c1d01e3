//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gatekeeper_requests_total` (counter): by method, status, class, outcome
//! - `gatekeeper_request_duration_seconds` (histogram): end-to-end latency
//! - `gatekeeper_rejections_total` (counter): short-circuits by reason
//! - `gatekeeper_store_degraded_total` (counter): fail-open admissions
//! - `gatekeeper_audit_persist_failures_total` (counter)
//!
//! Recording without an installed exporter is a no-op, so tests and embedders
//! that skip [`init_metrics`] pay nothing.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint started"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, class: &'static str, outcome: &'static str, start: Instant) {
    counter!(
        "gatekeeper_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "class" => class,
        "outcome" => outcome
    )
    .increment(1);
    histogram!("gatekeeper_request_duration_seconds", "class" => class)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_rejection(reason: &'static str) {
    counter!("gatekeeper_rejections_total", "reason" => reason).increment(1);
}

pub fn record_store_degraded(operation: &'static str) {
    counter!("gatekeeper_store_degraded_total", "operation" => operation).increment(1);
}

pub fn record_audit_persist_failure() {
    counter!("gatekeeper_audit_persist_failures_total").increment(1);
}
