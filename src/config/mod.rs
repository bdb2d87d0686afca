//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → RouterConfig (validated, immutable)
//!     → RoutingEngine::new registers the backends it lists
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → RoutingEngine::apply_config reconciles backends and swaps scoring policy
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - The registry re-validates each backend, so programmatic registration
//!   gets the same checks as file-driven registration

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    BackendConfig, BackendUpdate, HealthCheckConfig, ObservabilityConfig, RouterConfig,
    ScoringConfig, TelemetryConfig,
};
pub use validation::ValidationError;
pub use watcher::ConfigWatcher;
