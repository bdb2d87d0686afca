//! Backend routing and fallback engine.
//!
//! Given a task with capability and quality requirements, the engine picks
//! the best-fit backend among those registered, dispatches the work, keeps
//! rolling telemetry and probe-driven health per backend, enforces
//! per-backend throughput caps, and makes a single fallback hop on failure.
//!
//! # Architecture Overview
//!
//! ```text
//!   execute_task ──▶ routing ──▶ dispatch ──▶ BackendHandle::invoke
//!                      │  ▲          │
//!                      │  │          ├─▶ telemetry (per-backend window)
//!                      ▼  │          └─▶ resilience (one fallback hop)
//!                   registry ◀── health prober (periodic probes)
//!                      ▲
//!                   config (TOML, watcher, reconciliation)
//! ```

// Core subsystems
pub mod backend;
pub mod config;
pub mod registry;
pub mod routing;

// Per-backend live state
pub mod health;
pub mod telemetry;

// Orchestration
pub mod dispatch;
pub mod resilience;

// Cross-cutting concerns
pub mod error;
pub mod lifecycle;
pub mod observability;

pub use backend::{BackendError, BackendFactory, BackendHandle, BackendRequest, BackendResponse};
pub use config::{BackendConfig, BackendUpdate, RouterConfig};
pub use dispatch::{Completion, Overview, RoutingEngine, TaskOutcome};
pub use error::{EngineError, EngineResult};
pub use health::HealthRecord;
pub use routing::{ComplexityTier, TaskRequirement};
pub use telemetry::{TelemetrySnapshot, UsageSource};
