//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_calls_total` (counter): calls by path, outcome
//! - `gateway_call_duration_seconds` (histogram): call latency by path
//! - `gateway_active_connections` (gauge): registered delegate connections
//! - `gateway_late_responses_total` (counter): responses discarded after
//!   their pending call was already resolved
//! - `gateway_protocol_violations_total` (counter): connections torn down
//!   for malformed or unexpected frames

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "failed to install metrics exporter"),
    }
}

/// Record one finished call.
pub fn record_call(path: &str, outcome: &str, started: Instant) {
    metrics::counter!(
        "gateway_calls_total",
        "path" => path.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
    metrics::histogram!("gateway_call_duration_seconds", "path" => path.to_string())
        .record(started.elapsed().as_secs_f64());
}

/// Update the registered-connection gauge.
pub fn set_active_connections(count: usize) {
    metrics::gauge!("gateway_active_connections").set(count as f64);
}

/// A response arrived for a call that was no longer pending.
pub fn record_late_response() {
    metrics::counter!("gateway_late_responses_total").increment(1);
}

/// A connection was torn down for a protocol violation.
pub fn record_protocol_violation() {
    metrics::counter!("gateway_protocol_violations_total").increment(1);
}
