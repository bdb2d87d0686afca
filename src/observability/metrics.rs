//! Metrics collection and exposition.
//!
//! # Metrics
//! - `router_dispatch_total` (counter): attempts by backend and outcome
//! - `router_execution_duration_seconds` (histogram): unit-of-work latency per backend
//! - `router_fallback_total` (counter): fallback hops by from/to backend
//! - `router_no_candidate_total` (counter): selections that found nothing
//! - `router_backend_health` (gauge): 1=healthy, 0=unhealthy
//! - `router_probe_duration_seconds` (histogram): probe latency per backend
//! - `router_probe_failures_total` (counter): failed probes per backend
//! - `router_registered_backends` (gauge): registry size
//! - `router_budget_exceeded_total` (counter): advisory budget breaches
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op
//! - The Prometheus exporter is installed by the binary only

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_dispatch(backend: &str, outcome: &'static str, elapsed: Duration) {
    counter!("router_dispatch_total", "backend" => backend.to_string(), "outcome" => outcome)
        .increment(1);
    histogram!("router_execution_duration_seconds", "backend" => backend.to_string())
        .record(elapsed.as_secs_f64());
}

pub fn record_fallback(from: &str, to: &str) {
    counter!("router_fallback_total", "from" => from.to_string(), "to" => to.to_string())
        .increment(1);
}

pub fn record_no_candidate() {
    counter!("router_no_candidate_total").increment(1);
}

pub fn record_backend_health(backend: &str, healthy: bool) {
    gauge!("router_backend_health", "backend" => backend.to_string())
        .set(if healthy { 1.0 } else { 0.0 });
}

pub fn record_probe(backend: &str, elapsed: Duration, ok: bool) {
    histogram!("router_probe_duration_seconds", "backend" => backend.to_string())
        .record(elapsed.as_secs_f64());
    if !ok {
        counter!("router_probe_failures_total", "backend" => backend.to_string()).increment(1);
    }
}

pub fn record_registered_backends(count: usize) {
    gauge!("router_registered_backends").set(count as f64);
}

/// `budget` is one of `latency`, `cost`, `quality`.
pub fn record_budget_exceeded(backend: &str, budget: &'static str) {
    counter!("router_budget_exceeded_total", "backend" => backend.to_string(), "budget" => budget)
        .increment(1);
}
