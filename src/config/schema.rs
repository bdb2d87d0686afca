//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the router.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the routing engine.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct RouterConfig {
    /// Backends registered at startup.
    pub backends: Vec<BackendConfig>,

    /// Health prober settings.
    pub health_check: HealthCheckConfig,

    /// Candidate scoring policy.
    pub scoring: ScoringConfig,

    /// Rolling telemetry window settings.
    pub telemetry: TelemetryConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Static configuration of one computation backend.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct BackendConfig {
    /// Unique backend identifier.
    pub id: String,

    /// Capability tags describing what the backend can do.
    pub capabilities: BTreeSet<String>,

    /// Cost charged per consumed unit.
    #[serde(default)]
    pub cost_per_unit: f64,

    /// Admission cap: executions allowed per rolling minute.
    #[serde(default = "default_max_throughput")]
    pub max_throughput_per_minute: u32,

    /// Lower is preferred.
    #[serde(default)]
    pub priority: i32,

    /// Whether the backend may serve as the fallback hop.
    #[serde(default = "default_fallback_eligible")]
    pub fallback_eligible: bool,

    /// Where the backend handle connects to.
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Environment variable holding the backend credential.
    #[serde(default)]
    pub credential_env: Option<String>,
}

fn default_max_throughput() -> u32 {
    60
}

fn default_fallback_eligible() -> bool {
    true
}

impl BackendConfig {
    /// Create a backend config with default limits.
    pub fn new<I, S>(id: impl Into<String>, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: id.into(),
            capabilities: capabilities.into_iter().map(Into::into).collect(),
            cost_per_unit: 0.0,
            max_throughput_per_minute: default_max_throughput(),
            priority: 0,
            fallback_eligible: default_fallback_eligible(),
            endpoint: None,
            credential_env: None,
        }
    }

    #[must_use]
    pub fn with_cost_per_unit(mut self, cost: f64) -> Self {
        self.cost_per_unit = cost;
        self
    }

    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub fn with_max_throughput(mut self, per_minute: u32) -> Self {
        self.max_throughput_per_minute = per_minute;
        self
    }

    #[must_use]
    pub fn with_fallback_eligible(mut self, eligible: bool) -> Self {
        self.fallback_eligible = eligible;
        self
    }

    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Name of the environment variable holding the bearer credential.
    #[must_use]
    pub fn with_credential_env(mut self, var: impl Into<String>) -> Self {
        self.credential_env = Some(var.into());
        self
    }

    /// Merge a partial update into a copy of this config.
    pub fn merged(&self, update: &BackendUpdate) -> Self {
        let mut next = self.clone();
        if let Some(caps) = &update.capabilities {
            next.capabilities = caps.clone();
        }
        if let Some(cost) = update.cost_per_unit {
            next.cost_per_unit = cost;
        }
        if let Some(max) = update.max_throughput_per_minute {
            next.max_throughput_per_minute = max;
        }
        if let Some(priority) = update.priority {
            next.priority = priority;
        }
        if let Some(eligible) = update.fallback_eligible {
            next.fallback_eligible = eligible;
        }
        if let Some(endpoint) = &update.endpoint {
            next.endpoint = Some(endpoint.clone());
        }
        if let Some(var) = &update.credential_env {
            next.credential_env = Some(var.clone());
        }
        next
    }

    /// True when both configs would produce the same backend handle.
    pub fn same_connection(&self, other: &BackendConfig) -> bool {
        self.endpoint == other.endpoint && self.credential_env == other.credential_env
    }
}

/// Partial update applied by `update`. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct BackendUpdate {
    pub capabilities: Option<BTreeSet<String>>,
    pub cost_per_unit: Option<f64>,
    pub max_throughput_per_minute: Option<u32>,
    pub priority: Option<i32>,
    pub fallback_eligible: Option<bool>,
    pub endpoint: Option<String>,
    pub credential_env: Option<String>,
}

impl BackendUpdate {
    /// An update that turns `current` into `target` (id is ignored).
    pub fn between(current: &BackendConfig, target: &BackendConfig) -> Self {
        Self {
            capabilities: (current.capabilities != target.capabilities)
                .then(|| target.capabilities.clone()),
            cost_per_unit: (current.cost_per_unit != target.cost_per_unit)
                .then_some(target.cost_per_unit),
            max_throughput_per_minute: (current.max_throughput_per_minute
                != target.max_throughput_per_minute)
                .then_some(target.max_throughput_per_minute),
            priority: (current.priority != target.priority).then_some(target.priority),
            fallback_eligible: (current.fallback_eligible != target.fallback_eligible)
                .then_some(target.fallback_eligible),
            endpoint: if current.endpoint != target.endpoint {
                target.endpoint.clone()
            } else {
                None
            },
            credential_env: if current.credential_env != target.credential_env {
                target.credential_env.clone()
            } else {
                None
            },
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Health prober configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Enable the background prober.
    pub enabled: bool,

    /// Probe interval in seconds.
    pub interval_secs: u64,

    /// Per-probe timeout in seconds.
    pub timeout_secs: u64,

    /// Consecutive probe failures before a backend is marked unhealthy.
    pub unhealthy_threshold: u32,

    /// Number of recent issue descriptions kept per backend.
    pub max_recent_issues: usize,
}

impl HealthCheckConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 30,
            timeout_secs: 5,
            unhealthy_threshold: 1,
            max_recent_issues: 10,
        }
    }
}

/// Weighted scoring policy used to rank candidates.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ScoringConfig {
    pub capability_weight: f64,
    pub performance_weight: f64,
    pub cost_weight: f64,
    pub health_weight: f64,

    /// Cost per unit that normalizes to 1.0 (scores 0 on the cost term).
    pub reference_cost_per_unit: f64,

    /// Performance term used for a backend with no recorded executions.
    pub neutral_performance: f64,
}

impl ScoringConfig {
    /// Sum of all weights, the maximum attainable score.
    pub fn total_weight(&self) -> f64 {
        self.capability_weight + self.performance_weight + self.cost_weight + self.health_weight
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            capability_weight: 40.0,
            performance_weight: 30.0,
            cost_weight: 20.0,
            health_weight: 10.0,
            reference_cost_per_unit: 0.1,
            neutral_performance: 0.5,
        }
    }
}

/// Rolling telemetry configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct TelemetryConfig {
    /// How long execution records are kept, in seconds.
    pub retention_secs: u64,

    /// Admission-control window, in seconds.
    pub rate_window_secs: u64,

    /// Wall-clock milliseconds assumed per unit when a backend
    /// does not report usage.
    pub estimated_ms_per_unit: u64,
}

impl TelemetryConfig {
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }

    pub fn rate_window(&self) -> Duration {
        Duration::from_secs(self.rate_window_secs)
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            retention_secs: 24 * 60 * 60,
            rate_window_secs: 60,
            estimated_ms_per_unit: 100,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// `pretty` or `json`.
    pub log_format: String,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
