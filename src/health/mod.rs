//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Active health checks (active.rs):
//!     Periodic timer
//!     → Probe each backend through its handle (one probe per backend at a time)
//!     → Update state.rs
//!
//! State machine (state.rs):
//!     Unknown/Healthy → Unhealthy after `unhealthy_threshold` consecutive failures
//!     Any → Healthy after one successful probe
//! ```
//!
//! # Design Decisions
//! - Only probes move health; execution failures are telemetry, not health
//! - A probe error is recorded, never propagated
//! - Health state is per-backend and immediately visible to selection

pub mod active;
pub mod state;

pub use active::{HealthProber, ProbeOutcome};
pub use state::{BackendHealth, HealthRecord, HealthState};
