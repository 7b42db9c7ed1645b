//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define breaker metrics (state, transitions, rejections, outcomes)
//! - Expose a Prometheus-compatible endpoint when enabled
//!
//! # Metrics
//! - `breaker_state` (gauge): 0=closed, 1=open, 2=half-open, per connector
//! - `breaker_transitions_total` (counter): by connector, target state
//! - `breaker_rejected_total` (counter): calls refused while open
//! - `breaker_outcomes_total` (counter): by connector, result
//!
//! # Design Decisions
//! - Updates go through the `metrics` facade; with no recorder installed
//!   they are no-ops, so library users and tests pay nothing
//! - Never called while the breaker's lock is held

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::resilience::CircuitState;

/// Install the Prometheus recorder and HTTP listener.
///
/// Must run inside a Tokio runtime. Failure is logged, not fatal.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_state(connector: &str, state: CircuitState) {
    gauge!("breaker_state", "connector" => connector.to_string()).set(state.as_u8() as f64);
}

pub fn record_transition(connector: &str, to: CircuitState) {
    counter!(
        "breaker_transitions_total",
        "connector" => connector.to_string(),
        "to" => to.as_str()
    )
    .increment(1);
    record_state(connector, to);
}

pub fn record_rejected(connector: &str) {
    counter!("breaker_rejected_total", "connector" => connector.to_string()).increment(1);
}

/// `result` is one of `success`, `failure`, `ignored`.
pub fn record_outcome(connector: &str, result: &'static str) {
    counter!(
        "breaker_outcomes_total",
        "connector" => connector.to_string(),
        "result" => result
    )
    .increment(1);
}
