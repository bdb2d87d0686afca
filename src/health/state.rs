//! Backend health state machine.
//!
//! # States
//! - Unknown: registered, not probed yet (routable)
//! - Healthy: last probe succeeded
//! - Unhealthy: excluded from selection until a probe succeeds
//!
//! # State Transitions
//! ```text
//! Unknown/Healthy → Unhealthy: consecutive failures >= unhealthy_threshold
//! Any → Healthy: one successful probe
//! ```
//!
//! # Design Decisions
//! - The routable flag is a single atomic so selection never takes the issue lock
//! - Writers publish with Release, readers observe with Acquire
//! - Issue history is bounded; the oldest entry is dropped first

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;

/// Health State enum.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    Unknown = 0,
    Healthy = 1,
    Unhealthy = 2,
}

impl From<u8> for HealthState {
    fn from(val: u8) -> Self {
        match val {
            1 => HealthState::Healthy,
            2 => HealthState::Unhealthy,
            _ => HealthState::Unknown,
        }
    }
}

/// Point-in-time view of a backend's health.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthRecord {
    pub backend_id: String,
    pub is_healthy: bool,
    pub state: HealthState,
    pub consecutive_failures: u32,
    /// Milliseconds since the Unix epoch.
    pub last_probe_unix_ms: Option<u64>,
    pub last_probe_latency_ms: Option<u64>,
    /// Most recent first.
    pub recent_issues: Vec<String>,
}

#[derive(Debug, Default)]
struct ProbeLog {
    last_probe_unix_ms: Option<u64>,
    last_probe_latency_ms: Option<u64>,
    issues: VecDeque<String>,
}

/// Live health of a single backend.
#[derive(Debug)]
pub struct BackendHealth {
    state: AtomicU8,
    consecutive_failures: AtomicU32,
    probing: AtomicBool,
    log: Mutex<ProbeLog>,
}

impl Default for BackendHealth {
    fn default() -> Self {
        Self::new()
    }
}

fn unix_ms_now() -> Option<u64> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .ok()
        .map(|d| d.as_millis() as u64)
}

impl BackendHealth {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(HealthState::Unknown as u8),
            consecutive_failures: AtomicU32::new(0),
            probing: AtomicBool::new(false),
            log: Mutex::new(ProbeLog::default()),
        }
    }

    fn log(&self) -> MutexGuard<'_, ProbeLog> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> HealthState {
        HealthState::from(self.state.load(Ordering::Acquire))
    }

    /// Return true if backend is routable (Healthy or Unknown).
    pub fn is_healthy(&self) -> bool {
        self.state() != HealthState::Unhealthy
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::Acquire)
    }

    /// Report a successful probe.
    ///
    /// Returns true if this call moved the backend out of Unhealthy.
    pub fn mark_success(&self, latency: Duration) -> bool {
        let mut log = self.log();
        log.last_probe_unix_ms = unix_ms_now();
        log.last_probe_latency_ms = Some(latency.as_millis() as u64);
        log.issues.clear();

        self.consecutive_failures.store(0, Ordering::Release);
        let previous = self.state.swap(HealthState::Healthy as u8, Ordering::AcqRel);
        previous == HealthState::Unhealthy as u8
    }

    /// Report a failed probe.
    ///
    /// Returns true if this call moved the backend into Unhealthy.
    pub fn mark_failure(&self, reason: String, unhealthy_threshold: u32, max_issues: usize) -> bool {
        let mut log = self.log();
        log.last_probe_unix_ms = unix_ms_now();
        log.last_probe_latency_ms = None;
        log.issues.push_back(reason);
        while log.issues.len() > max_issues {
            log.issues.pop_front();
        }

        let failures = self.consecutive_failures.fetch_add(1, Ordering::AcqRel) + 1;
        if failures >= unhealthy_threshold {
            let previous = self.state.swap(HealthState::Unhealthy as u8, Ordering::AcqRel);
            return previous != HealthState::Unhealthy as u8;
        }
        false
    }

    /// Claim the probe slot. `None` if a probe is already in flight.
    pub fn try_begin_probe(&self) -> Option<ProbeGuard<'_>> {
        self.probing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| ProbeGuard { health: self })
    }

    pub fn record(&self, backend_id: &str) -> HealthRecord {
        let log = self.log();
        let state = self.state();
        HealthRecord {
            backend_id: backend_id.to_string(),
            is_healthy: state != HealthState::Unhealthy,
            state,
            consecutive_failures: self.consecutive_failures(),
            last_probe_unix_ms: log.last_probe_unix_ms,
            last_probe_latency_ms: log.last_probe_latency_ms,
            recent_issues: log.issues.iter().rev().cloned().collect(),
        }
    }
}

/// A RAII guard that holds a backend's single probe slot.
#[derive(Debug)]
pub struct ProbeGuard<'a> {
    health: &'a BackendHealth,
}

impl Drop for ProbeGuard<'_> {
    fn drop(&mut self) {
        self.health.probing.store(false, Ordering::Release);
    }
}
