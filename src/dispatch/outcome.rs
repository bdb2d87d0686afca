//! Dispatch results.

use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::telemetry::UsageSource;

/// What a unit of work hands back on success.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion<T> {
    pub value: T,
    /// Units the backend reported consuming, if it reports usage at all.
    pub units: Option<u64>,
}

impl<T> Completion<T> {
    pub fn new(value: T) -> Self {
        Self { value, units: None }
    }

    pub fn with_units(value: T, units: u64) -> Self {
        Self {
            value,
            units: Some(units),
        }
    }
}

/// A successful `execute_task`.
#[derive(Debug, Clone, Serialize)]
pub struct TaskOutcome<T> {
    pub result: T,
    pub backend_id: String,
    pub actual_cost: f64,
    #[serde(serialize_with = "as_millis")]
    pub response_time: Duration,
    pub units_used: u64,
    /// Whether `units_used` (and so `actual_cost`) was reported or estimated.
    pub usage: UsageSource,
    /// The failed primary when this result came from the fallback hop.
    pub fallback_from: Option<String>,
}

impl<T> TaskOutcome<T> {
    pub fn is_fallback(&self) -> bool {
        self.fallback_from.is_some()
    }
}

fn as_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

/// Dispatcher state, used as the `phase` field of dispatch logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchPhase {
    Selecting,
    ExecutingPrimary,
    ExecutingFallback,
    Succeeded,
    FailedTerminal,
}

impl fmt::Display for DispatchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DispatchPhase::Selecting => "selecting",
            DispatchPhase::ExecutingPrimary => "executing_primary",
            DispatchPhase::ExecutingFallback => "executing_fallback",
            DispatchPhase::Succeeded => "succeeded",
            DispatchPhase::FailedTerminal => "failed_terminal",
        };
        f.write_str(s)
    }
}

/// Engine-wide summary over the last hour.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Overview {
    pub total_backends: usize,
    pub healthy_backends: usize,
    pub requests_last_hour: u64,
    pub cost_last_hour: f64,
    pub avg_response_time_ms: f64,
    /// `healthy / total`, 0 with no backends.
    pub health_score: f64,
}

/// Result of [`RoutingEngine::apply_config`](crate::dispatch::RoutingEngine::apply_config).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcileReport {
    pub registered: Vec<String>,
    pub updated: Vec<String>,
    pub removed: Vec<String>,
    /// Backend id and the reason its change was not applied.
    pub failed: Vec<(String, String)>,
}
