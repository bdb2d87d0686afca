//! Per-backend rolling telemetry.
//!
//! # Responsibilities
//! - Append execution records in completion order
//! - Maintain cumulative counters and derived rates
//! - Answer rolling-window rate queries for admission control
//! - Drop records older than the retention window

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crate::telemetry::record::{ExecutionRecord, TelemetrySnapshot, WindowSummary};

#[derive(Debug)]
struct TelemetryWindow {
    snapshot: TelemetrySnapshot,
    /// Ordered by `finished_at`, oldest first.
    records: VecDeque<ExecutionRecord>,
}

/// Telemetry for a single backend.
///
/// Each backend owns its own lock, so writes to unrelated backends never
/// contend.
#[derive(Debug)]
pub struct BackendTelemetry {
    inner: Mutex<TelemetryWindow>,
}

impl BackendTelemetry {
    pub fn new(backend_id: &str) -> Self {
        Self {
            inner: Mutex::new(TelemetryWindow {
                snapshot: TelemetrySnapshot::fresh(backend_id),
                records: VecDeque::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, TelemetryWindow> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a completed execution and update counters.
    ///
    /// Records older than `retention` (relative to the new record) are
    /// dropped in the same critical section.
    pub fn record(&self, record: ExecutionRecord, retention: Duration) {
        let mut window = self.lock();
        let now = record.finished_at;

        let snapshot = &mut window.snapshot;
        snapshot.total += 1;
        if record.success {
            snapshot.succeeded += 1;
        } else {
            snapshot.failed += 1;
        }
        snapshot.total_cost += record.cost;
        snapshot.total_units += record.units;
        snapshot.success_rate = snapshot.succeeded as f64 / snapshot.total as f64;
        snapshot.error_rate = snapshot.failed as f64 / snapshot.total as f64;
        snapshot.last_used_unix_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .ok()
            .map(|d| d.as_millis() as u64);

        // Completions normally arrive in order; keep the deque sorted when they don't.
        let position = window
            .records
            .iter()
            .rposition(|r| r.finished_at <= record.finished_at)
            .map_or(0, |i| i + 1);
        window.records.insert(position, record);

        Self::prune_locked(&mut window, now, retention);
    }

    /// Executions completed within `window` before `now`.
    ///
    /// The window is half-open: a record exactly `window` old is excluded.
    pub fn rate_at(&self, now: Instant, window: Duration) -> usize {
        let guard = self.lock();
        guard
            .records
            .iter()
            .rev()
            .take_while(|r| now.saturating_duration_since(r.finished_at) < window)
            .count()
    }

    /// Summary of executions completed within `horizon` before `now`.
    pub fn summary_since(&self, now: Instant, horizon: Duration) -> WindowSummary {
        let guard = self.lock();
        guard
            .records
            .iter()
            .rev()
            .take_while(|r| now.saturating_duration_since(r.finished_at) < horizon)
            .fold(WindowSummary::default(), |mut acc, r| {
                acc.requests += 1;
                acc.cost += r.cost;
                acc.total_duration += r.duration();
                acc
            })
    }

    /// Drop records older than `retention`.
    pub fn prune(&self, now: Instant, retention: Duration) -> usize {
        let mut window = self.lock();
        Self::prune_locked(&mut window, now, retention)
    }

    fn prune_locked(window: &mut TelemetryWindow, now: Instant, retention: Duration) -> usize {
        let mut removed = 0;
        while window
            .records
            .front()
            .is_some_and(|r| now.saturating_duration_since(r.finished_at) >= retention)
        {
            window.records.pop_front();
            removed += 1;
        }
        window.snapshot.retained_records = window.records.len();
        removed
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        self.lock().snapshot.clone()
    }

    /// Copy of the retained records, oldest first.
    pub fn records(&self) -> Vec<ExecutionRecord> {
        self.lock().records.iter().cloned().collect()
    }
}
