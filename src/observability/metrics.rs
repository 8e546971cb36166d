//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define framework metrics (requests, responses, latency, connections,
//!   errors)
//! - Expose a Prometheus-compatible scrape endpoint
//!
//! # Metrics
//! - `trellis_requests_total{method}` (counter): requests received
//! - `trellis_responses_total{method, status_class}` (counter): responses
//!   written, by status class
//! - `trellis_handler_duration_seconds{method}` (histogram): handler latency
//! - `trellis_active_connections` (gauge): open connections
//! - `trellis_request_errors_total{kind}` (counter): one per parse, binding,
//!   handler, or connection error; no error kind goes unrecorded

use std::net::SocketAddr;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter on its own listener. Failure is logged
/// and disables exposition; the recorders themselves keep working.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str) {
    metrics::counter!("trellis_requests_total", "method" => method.to_string()).increment(1);
}

pub fn record_response(method: &str, status: u16) {
    let class = match status {
        100..=199 => "1xx",
        200..=299 => "2xx",
        300..=399 => "3xx",
        400..=499 => "4xx",
        _ => "5xx",
    };
    metrics::counter!(
        "trellis_responses_total",
        "method" => method.to_string(),
        "status_class" => class,
    )
    .increment(1);
}

pub fn record_handler_duration(method: &str, elapsed: Duration) {
    metrics::histogram!(
        "trellis_handler_duration_seconds",
        "method" => method.to_string(),
    )
    .record(elapsed.as_secs_f64());
}

pub fn record_error(kind: &str) {
    metrics::counter!("trellis_request_errors_total", "kind" => kind.to_string()).increment(1);
}

pub fn connection_opened() {
    metrics::gauge!("trellis_active_connections").increment(1.0);
}

pub fn connection_closed() {
    metrics::gauge!("trellis_active_connections").decrement(1.0);
}
