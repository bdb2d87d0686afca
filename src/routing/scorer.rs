//! Weighted candidate scoring.
//!
//! # Formula
//! ```text
//! capability  = |required ∩ provided| / |required|              × capability_weight
//! performance = 0.7 × (1 − error_rate) + 0.3 × success_rate      × performance_weight
//!               (neutral_performance when there is no history)
//! cost        = max(0, 1 − cost_per_unit / reference_cost)      × cost_weight
//! health      = 1 if healthy else 0                             × health_weight
//! ```
//!
//! # Tie-break chain
//! Higher total, then lower priority, then lower error rate, then earlier
//! registration. Registration order is unique, so the chain is total.

use std::cmp::Ordering;

use serde::Serialize;

use crate::config::ScoringConfig;
use crate::routing::requirement::TaskRequirement;
use crate::routing::selector::{capability_overlap, Candidate};

/// Weighted terms of a candidate's score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub capability: f64,
    pub performance: f64,
    pub cost: f64,
    pub health: f64,
    pub total: f64,
}

impl ScoreBreakdown {
    /// Total scaled to [0, 1] by the policy's weight sum.
    pub fn normalized(&self, policy: &ScoringConfig) -> f64 {
        let weight = policy.total_weight();
        if weight > 0.0 {
            self.total / weight
        } else {
            0.0
        }
    }
}

pub fn score(candidate: &Candidate, requirement: &TaskRequirement, policy: &ScoringConfig) -> ScoreBreakdown {
    let required = requirement.required_capabilities.len();
    let capability_fraction = if required == 0 {
        0.0
    } else {
        capability_overlap(candidate.config(), requirement) as f64 / required as f64
    };

    let snapshot = &candidate.snapshot;
    let performance_fraction = if snapshot.has_history() {
        0.7 * (1.0 - snapshot.error_rate) + 0.3 * snapshot.success_rate
    } else {
        policy.neutral_performance
    };

    let normalized_cost = candidate.config().cost_per_unit / policy.reference_cost_per_unit;
    let cost_fraction = (1.0 - normalized_cost).max(0.0);

    let health_fraction = if candidate.healthy { 1.0 } else { 0.0 };

    let capability = capability_fraction * policy.capability_weight;
    let performance = performance_fraction * policy.performance_weight;
    let cost = cost_fraction * policy.cost_weight;
    let health = health_fraction * policy.health_weight;

    ScoreBreakdown {
        capability,
        performance,
        cost,
        health,
        total: capability + performance + cost + health,
    }
}

fn rank(a: (&Candidate, &ScoreBreakdown), b: (&Candidate, &ScoreBreakdown)) -> Ordering {
    b.1.total
        .total_cmp(&a.1.total)
        .then_with(|| a.0.config().priority.cmp(&b.0.config().priority))
        .then_with(|| a.0.snapshot.error_rate.total_cmp(&b.0.snapshot.error_rate))
        .then_with(|| a.0.seq().cmp(&b.0.seq()))
}

/// Pick the winning candidate, or `None` when there are none.
pub fn select_best<'a>(
    candidates: &'a [Candidate],
    requirement: &TaskRequirement,
    policy: &ScoringConfig,
) -> Option<(&'a Candidate, ScoreBreakdown)> {
    let scored: Vec<_> = candidates
        .iter()
        .map(|c| (c, score(c, requirement, policy)))
        .collect();

    for (candidate, breakdown) in &scored {
        tracing::trace!(
            backend_id = %candidate.id(),
            total = breakdown.total,
            capability = breakdown.capability,
            performance = breakdown.performance,
            cost = breakdown.cost,
            health = breakdown.health,
            "Scored candidate"
        );
    }

    scored
        .into_iter()
        .min_by(|a, b| rank((a.0, &a.1), (b.0, &b.1)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::testing::idle_registry;
    use crate::config::BackendConfig;
    use crate::routing::selector::get_candidates;
    use crate::telemetry::TelemetrySnapshot;
    use std::time::{Duration, Instant};

    fn candidates(configs: Vec<BackendConfig>, req: &TaskRequirement) -> Vec<Candidate> {
        let registry = idle_registry(configs);
        get_candidates(&registry, req, Instant::now(), Duration::from_secs(60))
    }

    fn with_history(mut candidate: Candidate, succeeded: u64, failed: u64) -> Candidate {
        let total = succeeded + failed;
        candidate.snapshot = TelemetrySnapshot {
            total,
            succeeded,
            failed,
            success_rate: succeeded as f64 / total as f64,
            error_rate: failed as f64 / total as f64,
            ..TelemetrySnapshot::fresh(candidate.id())
        };
        candidate
    }

    #[test]
    fn test_neutral_breakdown() {
        let req = TaskRequirement::new(["x", "y"]);
        let found = candidates(vec![BackendConfig::new("a", ["x"]).with_cost_per_unit(0.05)], &req);
        let breakdown = score(&found[0], &req, &ScoringConfig::default());

        assert!((breakdown.capability - 20.0).abs() < 1e-9);
        assert!((breakdown.performance - 15.0).abs() < 1e-9);
        assert!((breakdown.cost - 10.0).abs() < 1e-9);
        assert!((breakdown.health - 10.0).abs() < 1e-9);
        assert!((breakdown.total - 55.0).abs() < 1e-9);
        assert!((breakdown.normalized(&ScoringConfig::default()) - 0.55).abs() < 1e-9);
    }

    #[test]
    fn test_cost_term_floors_at_zero() {
        let req = TaskRequirement::new(["x"]);
        let found = candidates(vec![BackendConfig::new("pricey", ["x"]).with_cost_per_unit(0.5)], &req);
        assert_eq!(score(&found[0], &req, &ScoringConfig::default()).cost, 0.0);
    }

    #[test]
    fn test_performance_from_history() {
        let req = TaskRequirement::new(["x"]);
        let found = candidates(vec![BackendConfig::new("a", ["x"])], &req);
        let candidate = with_history(found[0].clone(), 3, 1);
        // 0.7 * 0.75 + 0.3 * 0.75 = 0.75
        let breakdown = score(&candidate, &req, &ScoringConfig::default());
        assert!((breakdown.performance - 22.5).abs() < 1e-9);
    }

    #[test]
    fn test_priority_breaks_exact_tie() {
        let req = TaskRequirement::new(["x"]);
        let found = candidates(
            vec![
                BackendConfig::new("b", ["x"]).with_priority(2),
                BackendConfig::new("a", ["x"]).with_priority(1),
            ],
            &req,
        );
        for _ in 0..10 {
            let (winner, _) = select_best(&found, &req, &ScoringConfig::default()).unwrap();
            assert_eq!(winner.id(), "a");
        }
    }

    #[test]
    fn test_error_rate_then_registration_order() {
        let req = TaskRequirement::new(["x"]);
        let found = candidates(
            vec![BackendConfig::new("first", ["x"]), BackendConfig::new("second", ["x"])],
            &req,
        );
        assert_eq!(
            select_best(&found, &req, &ScoringConfig::default()).unwrap().0.id(),
            "first"
        );

        // Zero performance weight so differing histories still tie on total.
        let policy = ScoringConfig {
            performance_weight: 0.0,
            ..Default::default()
        };
        let mixed = vec![with_history(found[0].clone(), 1, 1), with_history(found[1].clone(), 2, 0)];
        assert_eq!(select_best(&mixed, &req, &policy).unwrap().0.id(), "second");
    }

    #[test]
    fn test_empty_candidates() {
        let req = TaskRequirement::new(["x"]);
        assert!(select_best(&[], &req, &ScoringConfig::default()).is_none());
    }
}
