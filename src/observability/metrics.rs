//! Metrics collection and exposition.
//!
//! # Metrics
//! - `nexus_requests_total` (counter): requests by method and status
//! - `nexus_request_duration_seconds` (histogram): latency distribution
//! - `nexus_rate_limited_total` (counter): rejections by scope (`global`, `client`)
//! - `nexus_auth_failures_total` (counter): authentication failures by reason
//! - `nexus_authorization_denied_total` (counter): permission denials by permission
//! - `nexus_panics_total` (counter): faults caught by the recovery stage

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape listener on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "metrics exporter listening");
    Ok(())
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    let status = status.to_string();
    counter!("nexus_requests_total", "method" => method.to_string(), "status" => status.clone())
        .increment(1);
    histogram!("nexus_request_duration_seconds", "method" => method.to_string(), "status" => status)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_rate_limited(scope: &'static str) {
    counter!("nexus_rate_limited_total", "scope" => scope).increment(1);
}

pub fn record_auth_failure(reason: &'static str) {
    counter!("nexus_auth_failures_total", "reason" => reason).increment(1);
}

pub fn record_authorization_denied(permission: &'static str) {
    counter!("nexus_authorization_denied_total", "permission" => permission).increment(1);
}

pub fn record_panic() {
    counter!("nexus_panics_total").increment(1);
}
