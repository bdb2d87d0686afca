//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate backend definitions before they reach the registry
//! - Validate value ranges (intervals > 0, weights usable)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is a pure function: RouterConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::fmt;

use crate::config::schema::{BackendConfig, RouterConfig, ScoringConfig};

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate one backend definition.
pub fn validate_backend(config: &BackendConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let prefix = format!("backends.{}", config.id);

    if config.id.trim().is_empty() {
        errors.push(ValidationError::new("backends.id", "must not be empty"));
    }
    if config.capabilities.is_empty() {
        errors.push(ValidationError::new(
            format!("{prefix}.capabilities"),
            "at least one capability tag is required",
        ));
    }
    if config.capabilities.iter().any(|c| c.trim().is_empty()) {
        errors.push(ValidationError::new(
            format!("{prefix}.capabilities"),
            "capability tags must not be blank",
        ));
    }
    if !config.cost_per_unit.is_finite() || config.cost_per_unit < 0.0 {
        errors.push(ValidationError::new(
            format!("{prefix}.cost_per_unit"),
            "must be a non-negative number",
        ));
    }
    if config.max_throughput_per_minute == 0 {
        errors.push(ValidationError::new(
            format!("{prefix}.max_throughput_per_minute"),
            "must be greater than zero",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate a scoring policy.
pub fn validate_scoring(scoring: &ScoringConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let weights = [
        ("scoring.capability_weight", scoring.capability_weight),
        ("scoring.performance_weight", scoring.performance_weight),
        ("scoring.cost_weight", scoring.cost_weight),
        ("scoring.health_weight", scoring.health_weight),
    ];
    for (field, weight) in weights {
        if !weight.is_finite() || weight < 0.0 {
            errors.push(ValidationError::new(field, "must be a non-negative number"));
        }
    }
    if errors.is_empty() && scoring.total_weight() <= 0.0 {
        errors.push(ValidationError::new("scoring", "at least one weight must be positive"));
    }
    if !scoring.reference_cost_per_unit.is_finite() || scoring.reference_cost_per_unit <= 0.0 {
        errors.push(ValidationError::new(
            "scoring.reference_cost_per_unit",
            "must be greater than zero",
        ));
    }
    if !(0.0..=1.0).contains(&scoring.neutral_performance) {
        errors.push(ValidationError::new(
            "scoring.neutral_performance",
            "must be within [0, 1]",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate a whole router configuration.
pub fn validate_config(config: &RouterConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let mut seen = HashSet::new();
    for backend in &config.backends {
        if !seen.insert(backend.id.as_str()) {
            errors.push(ValidationError::new(
                format!("backends.{}", backend.id),
                "duplicate backend id",
            ));
        }
        if let Err(mut backend_errors) = validate_backend(backend) {
            errors.append(&mut backend_errors);
        }
    }

    if config.health_check.interval_secs == 0 {
        errors.push(ValidationError::new(
            "health_check.interval_secs",
            "must be greater than zero",
        ));
    }
    if config.health_check.timeout_secs == 0 {
        errors.push(ValidationError::new(
            "health_check.timeout_secs",
            "must be greater than zero",
        ));
    }
    if config.health_check.unhealthy_threshold == 0 {
        errors.push(ValidationError::new(
            "health_check.unhealthy_threshold",
            "must be at least 1",
        ));
    }

    if let Err(mut scoring_errors) = validate_scoring(&config.scoring) {
        errors.append(&mut scoring_errors);
    }

    if config.telemetry.rate_window_secs == 0 {
        errors.push(ValidationError::new(
            "telemetry.rate_window_secs",
            "must be greater than zero",
        ));
    }
    if config.telemetry.retention_secs < config.telemetry.rate_window_secs {
        errors.push(ValidationError::new(
            "telemetry.retention_secs",
            "must cover at least the rate window",
        ));
    }
    if config.telemetry.estimated_ms_per_unit == 0 {
        errors.push(ValidationError::new(
            "telemetry.estimated_ms_per_unit",
            "must be greater than zero",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
