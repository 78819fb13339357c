//! Metrics collection and exposition.
//!
//! # Metrics
//! - `admission_rate_limit_decisions_total` (counter): by `backend`, `outcome`
//! - `admission_rate_limit_degraded_total` (counter): by `policy`
//!   (`fail_open` / `fail_closed`), once per breaker trip
//! - `admission_body_rejections_total` (counter): by `reason`
//!   (`declared_length`, `streamed_overflow`, `invalid_length`)
//!
//! # Design Decisions
//! - The Prometheus exporter is optional; recording without it costs nothing
//! - Label values are static strings, so cardinality stays bounded

use std::net::SocketAddr;

use metrics::counter;
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its HTTP listener on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_rate_limit_decision(backend: &'static str, allowed: bool) {
    let outcome = if allowed { "allowed" } else { "denied" };
    counter!(
        "admission_rate_limit_decisions_total",
        "backend" => backend,
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_degraded_entry(fail_open: bool) {
    let policy = if fail_open { "fail_open" } else { "fail_closed" };
    counter!("admission_rate_limit_degraded_total", "policy" => policy).increment(1);
}

pub fn record_body_rejection(reason: &'static str) {
    counter!("admission_body_rejections_total", "reason" => reason).increment(1);
}
