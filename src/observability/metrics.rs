//! Metrics collection and exposition.
//!
//! # Metrics
//! - `inflight_store_retries_total` (counter): retried store operations by op
//! - `inflight_store_exhausted_total` (counter): operations that ran out of retries
//! - `inflight_ttl_refresh_failures_total` (counter): TTL renewals that failed
//! - `inflight_count` (gauge): last observed count by provider
//! - `inflight_acquire_total` (counter): guard entries by result
//! - `inflight_release_total` (counter): guard exits by result
//! - `inflight_admission_total` (counter): QoS decisions by provider, decision
//! - `inflight_admission_read_failures_total` (counter): fail-open reads

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_store_retry(op: &'static str) {
    ::metrics::counter!("inflight_store_retries_total", "op" => op).increment(1);
}

pub fn record_store_exhausted(op: &'static str) {
    ::metrics::counter!("inflight_store_exhausted_total", "op" => op).increment(1);
}

pub fn record_ttl_refresh_failure() {
    ::metrics::counter!("inflight_ttl_refresh_failures_total").increment(1);
}

pub fn record_inflight_value(provider: &str, value: i64) {
    ::metrics::gauge!("inflight_count", "provider" => provider.to_string()).set(value as f64);
}

pub fn record_acquire(result: &'static str) {
    ::metrics::counter!("inflight_acquire_total", "result" => result).increment(1);
}

pub fn record_release(result: &'static str) {
    ::metrics::counter!("inflight_release_total", "result" => result).increment(1);
}

pub fn record_admission(provider: &str, admitted: bool) {
    let decision = if admitted { "admitted" } else { "rejected" };
    ::metrics::counter!(
        "inflight_admission_total",
        "provider" => provider.to_string(),
        "decision" => decision
    )
    .increment(1);
}

pub fn record_admission_read_failure() {
    ::metrics::counter!("inflight_admission_read_failures_total").increment(1);
}
