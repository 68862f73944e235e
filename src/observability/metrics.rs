//! Metrics collection and exposition.
//!
//! # Metrics
//! - `rollup_source_queries_total` (counter): collaborator calls by kind, outcome
//! - `rollup_source_query_duration_seconds` (histogram): collaborator latency by kind
//! - `rollup_services_processed_total` (counter): per-service pipelines by outcome
//! - `rollup_correlated_messages_total` (counter): messages assigned to a path
//! - `rollup_snapshot_writes_total` (counter): daily snapshots persisted
//! - `rollup_cache_reads_total` (counter): snapshot reads by outcome
//! - `rollup_http_requests_total` (counter): API requests by route, status

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_source_query(kind: &'static str, outcome: &'static str, started: Instant) {
    counter!("rollup_source_queries_total", "kind" => kind, "outcome" => outcome).increment(1);
    histogram!("rollup_source_query_duration_seconds", "kind" => kind)
        .record(started.elapsed().as_secs_f64());
}

pub fn record_service_processed(outcome: &'static str) {
    counter!("rollup_services_processed_total", "outcome" => outcome).increment(1);
}

pub fn record_correlated_messages(count: usize) {
    counter!("rollup_correlated_messages_total").increment(count as u64);
}

pub fn record_snapshot_write() {
    counter!("rollup_snapshot_writes_total").increment(1);
}

pub fn record_cache_read(outcome: &'static str) {
    counter!("rollup_cache_reads_total", "outcome" => outcome).increment(1);
}

pub fn record_http_request(route: &'static str, status: u16) {
    counter!("rollup_http_requests_total", "route" => route, "status" => status.to_string())
        .increment(1);
}
