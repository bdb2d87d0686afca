//! Execution records and telemetry snapshots.

use std::time::{Duration, Instant};

use serde::Serialize;

/// One completed execution attempt.
#[derive(Debug, Clone)]
pub struct ExecutionRecord {
    pub task_id: String,
    pub backend_id: String,
    pub started_at: Instant,
    pub finished_at: Instant,
    pub success: bool,
    pub cost: f64,
    pub units: u64,
    /// Attempt was the fallback hop.
    pub fallback: bool,
}

impl ExecutionRecord {
    pub fn duration(&self) -> Duration {
        self.finished_at.saturating_duration_since(self.started_at)
    }
}

/// Where usage figures came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageSource {
    /// Reported by the backend.
    Reported,
    /// Derived from wall-clock duration.
    Estimated,
}

/// Point-in-time view of a backend's execution counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetrySnapshot {
    pub backend_id: String,
    pub total: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub success_rate: f64,
    pub error_rate: f64,
    pub total_cost: f64,
    pub total_units: u64,
    /// Milliseconds since the Unix epoch.
    pub last_used_unix_ms: Option<u64>,
    /// Records still inside the retention window.
    pub retained_records: usize,
}

impl TelemetrySnapshot {
    /// Snapshot for a backend that has never executed anything.
    pub fn fresh(backend_id: impl Into<String>) -> Self {
        Self {
            backend_id: backend_id.into(),
            total: 0,
            succeeded: 0,
            failed: 0,
            success_rate: 1.0,
            error_rate: 0.0,
            total_cost: 0.0,
            total_units: 0,
            last_used_unix_ms: None,
            retained_records: 0,
        }
    }

    pub fn has_history(&self) -> bool {
        self.total > 0
    }
}

/// Aggregate over the records inside some horizon.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WindowSummary {
    pub requests: u64,
    pub cost: f64,
    pub total_duration: Duration,
}
