//! Candidate selection.
//!
//! # Responsibilities
//! - Keep backends that share at least one capability with the requirement
//! - Drop unhealthy backends
//! - Drop backends at or over their per-minute throughput cap
//! - Order survivors by priority, then registration order
//!
//! An empty result is a normal outcome.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::BackendConfig;
use crate::registry::{BackendEntry, BackendRegistry, Binding};
use crate::routing::requirement::TaskRequirement;
use crate::telemetry::TelemetrySnapshot;

/// A backend that passed filtering, frozen at selection time.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub entry: Arc<BackendEntry>,
    pub binding: Arc<Binding>,
    pub snapshot: TelemetrySnapshot,
    pub healthy: bool,
    /// Executions inside the rate window when this candidate was taken.
    pub recent_executions: usize,
}

impl Candidate {
    pub fn id(&self) -> &str {
        self.entry.id()
    }

    pub fn config(&self) -> &BackendConfig {
        &self.binding.config
    }

    pub fn seq(&self) -> u64 {
        self.entry.seq()
    }
}

/// Number of required capabilities the backend provides.
pub fn capability_overlap(config: &BackendConfig, requirement: &TaskRequirement) -> usize {
    config
        .capabilities
        .intersection(&requirement.required_capabilities)
        .count()
}

/// Backends able to take `requirement` at `now`.
pub fn get_candidates(
    registry: &BackendRegistry,
    requirement: &TaskRequirement,
    now: Instant,
    rate_window: Duration,
) -> Vec<Candidate> {
    let mut candidates: Vec<Candidate> = registry
        .entries()
        .into_iter()
        .filter_map(|entry| {
            let binding = entry.binding();
            if capability_overlap(&binding.config, requirement) == 0 {
                return None;
            }
            if !entry.health.is_healthy() {
                tracing::trace!(backend_id = %entry.id(), "Skipping unhealthy backend");
                return None;
            }
            let recent = entry.telemetry.rate_at(now, rate_window);
            if recent >= binding.config.max_throughput_per_minute as usize {
                tracing::debug!(
                    backend_id = %entry.id(),
                    recent,
                    cap = binding.config.max_throughput_per_minute,
                    "Skipping rate-limited backend"
                );
                return None;
            }
            Some(Candidate {
                snapshot: entry.telemetry.snapshot(),
                healthy: true,
                recent_executions: recent,
                binding,
                entry,
            })
        })
        .collect();

    candidates.sort_by_key(|c| (c.config().priority, c.seq()));
    candidates
}
