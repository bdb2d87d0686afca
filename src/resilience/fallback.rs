//! Single-hop fallback selection.
//!
//! # Rules
//! - Healthy, fallback-eligible, and not the backend that just failed
//! - Lowest priority number wins; registration order breaks ties
//! - Capabilities and throughput are not re-checked
//! - Exactly one hop: the fallback's own failure is terminal

use std::sync::Arc;

use crate::registry::{BackendEntry, BackendRegistry};

/// Fallback for a task whose attempt on `failed_id` just failed.
pub fn select_fallback(registry: &BackendRegistry, failed_id: &str) -> Option<Arc<BackendEntry>> {
    registry
        .entries()
        .into_iter()
        .filter(|entry| entry.id() != failed_id)
        .filter(|entry| entry.health.is_healthy())
        .filter(|entry| entry.binding().config.fallback_eligible)
        .min_by_key(|entry| (entry.binding().config.priority, entry.seq()))
}
