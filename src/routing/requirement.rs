//! Task requirements.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// Ordinal difficulty of a task.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ComplexityTier {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for ComplexityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ComplexityTier::Low => "low",
            ComplexityTier::Medium => "medium",
            ComplexityTier::High => "high",
            ComplexityTier::Critical => "critical",
        };
        f.write_str(s)
    }
}

impl FromStr for ComplexityTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(ComplexityTier::Low),
            "medium" => Ok(ComplexityTier::Medium),
            "high" => Ok(ComplexityTier::High),
            "critical" => Ok(ComplexityTier::Critical),
            other => Err(format!("unknown complexity tier '{other}'")),
        }
    }
}

/// What a task needs from a backend.
///
/// Only `required_capabilities` affects selection. The latency, cost and
/// quality budgets are checked after a successful execution and reported
/// as advisories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRequirement {
    pub required_capabilities: BTreeSet<String>,
    #[serde(default)]
    pub complexity: ComplexityTier,
    #[serde(default, with = "optional_millis")]
    pub max_latency: Option<Duration>,
    #[serde(default)]
    pub max_cost: Option<f64>,
    /// Normalized score in [0, 1].
    #[serde(default)]
    pub min_quality: Option<f64>,
}

impl TaskRequirement {
    pub fn new<I, S>(capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            required_capabilities: capabilities.into_iter().map(Into::into).collect(),
            complexity: ComplexityTier::default(),
            max_latency: None,
            max_cost: None,
            min_quality: None,
        }
    }

    pub fn with_complexity(mut self, complexity: ComplexityTier) -> Self {
        self.complexity = complexity;
        self
    }

    pub fn with_max_latency(mut self, latency: Duration) -> Self {
        self.max_latency = Some(latency);
        self
    }

    pub fn with_max_cost(mut self, cost: f64) -> Self {
        self.max_cost = Some(cost);
        self
    }

    pub fn with_min_quality(mut self, quality: f64) -> Self {
        self.min_quality = Some(quality);
        self
    }

    pub fn validate(&self) -> EngineResult<()> {
        if self.required_capabilities.is_empty() {
            return Err(EngineError::InvalidRequirement(
                "required capabilities must not be empty".into(),
            ));
        }
        if self.required_capabilities.iter().any(|c| c.trim().is_empty()) {
            return Err(EngineError::InvalidRequirement(
                "capability tags must not be blank".into(),
            ));
        }
        if let Some(cost) = self.max_cost {
            if !cost.is_finite() || cost < 0.0 {
                return Err(EngineError::InvalidRequirement(format!(
                    "max_cost must be a non-negative number, got {cost}"
                )));
            }
        }
        if let Some(quality) = self.min_quality {
            if !(0.0..=1.0).contains(&quality) {
                return Err(EngineError::InvalidRequirement(format!(
                    "min_quality must be within [0, 1], got {quality}"
                )));
            }
        }
        Ok(())
    }

    pub fn capability_list(&self) -> Vec<String> {
        self.required_capabilities.iter().cloned().collect()
    }
}

mod optional_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_some(&(d.as_millis() as u64)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?.map(Duration::from_millis))
    }
}
