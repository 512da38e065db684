//! Metrics collection and exposition.
//!
//! # Metrics
//! - `request_context_requests_total` (counter): requests by whether the id was adopted
//! - `request_context_missing_total` (counter): accessor calls with no open context
//! - `request_context_units_active` (gauge): units currently holding a record
//!
//! # Design Decisions
//! - Recorded through the `metrics` facade; a no-op until an exporter is installed
//! - Prometheus exporter is optional and owned by the binary

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use std::net::SocketAddr;

/// Install the Prometheus exporter serving `/metrics` on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_request(adopted: bool) {
    let adopted = if adopted { "true" } else { "false" };
    metrics::counter!("request_context_requests_total", "adopted" => adopted).increment(1);
}

pub fn record_missing_context(operation: &'static str) {
    metrics::counter!("request_context_missing_total", "operation" => operation).increment(1);
}

pub fn record_unit_opened() {
    metrics::gauge!("request_context_units_active").increment(1.0);
}

pub fn record_unit_released() {
    metrics::gauge!("request_context_units_active").decrement(1.0);
}
