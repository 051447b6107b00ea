//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define gateway metrics (requests, latency, rejections, errors)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `bff_requests_total` (counter): requests by method, status, outcome
//! - `bff_request_duration_seconds` (histogram): latency distribution
//! - `bff_admission_rejected_total` (counter): rejections by class, reason
//! - `bff_errors_total` (counter): classified failures by kind
//! - `bff_rate_limit_buckets` (gauge): buckets currently tracked
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op, which keeps tests free of globals

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its HTTP listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Record a finished request.
pub fn record_request(method: &str, status: u16, outcome: &'static str, start: Instant) {
    counter!(
        "bff_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "outcome" => outcome
    )
    .increment(1);
    histogram!("bff_request_duration_seconds", "outcome" => outcome)
        .record(start.elapsed().as_secs_f64());
}

/// Record an admission rejection.
pub fn record_admission_rejected(class: &'static str, reason: &'static str) {
    counter!("bff_admission_rejected_total", "class" => class, "reason" => reason).increment(1);
}

/// Record a classified failure.
pub fn record_error(kind: &'static str) {
    counter!("bff_errors_total", "kind" => kind).increment(1);
}

/// Publish the number of tracked rate-limit buckets.
pub fn record_bucket_count(count: usize) {
    gauge!("bff_rate_limit_buckets").set(count as f64);
}
