//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_cache_lookups_total` (counter): lookups by `result` (hit, miss)
//! - `proxy_cache_inserts_total` (counter): responses stored in the cache
//! - `proxy_cache_inserted_bytes_total` (counter): bytes stored in the cache
//! - `proxy_cache_skipped_total` (counter): responses not cached, by `reason`
//! - `proxy_origin_errors_total` (counter): origin failures by `kind`
//! - `proxy_requests_rejected_total` (counter): client requests refused, by `reason`
//! - `proxy_relayed_bytes_total` (counter): bytes sent to clients, by `source`
//! - `proxy_active_connections` (gauge): connections being handled
//!
//! Recording is a no-op until a recorder is installed, so library users and
//! tests pay nothing unless [`init_metrics`] has run.

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and serve it on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_cache_lookup(hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    metrics::counter!("proxy_cache_lookups_total", "result" => result).increment(1);
}

pub fn record_cache_insert(bytes: usize) {
    metrics::counter!("proxy_cache_inserts_total").increment(1);
    metrics::counter!("proxy_cache_inserted_bytes_total").increment(bytes as u64);
}

pub fn record_cache_skipped(reason: &'static str) {
    metrics::counter!("proxy_cache_skipped_total", "reason" => reason).increment(1);
}

pub fn record_origin_error(kind: &'static str) {
    metrics::counter!("proxy_origin_errors_total", "kind" => kind).increment(1);
}

pub fn record_rejected(reason: &'static str) {
    metrics::counter!("proxy_requests_rejected_total", "reason" => reason).increment(1);
}

pub fn record_relayed_bytes(source: &'static str, bytes: u64) {
    metrics::counter!("proxy_relayed_bytes_total", "source" => source).increment(bytes);
}

pub fn set_active_connections(count: u64) {
    metrics::gauge!("proxy_active_connections").set(count as f64);
}
