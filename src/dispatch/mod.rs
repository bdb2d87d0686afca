//! Task dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! execute_task(task_id, task_type, work, requirement)
//!     SELECTING          → routing (candidates + score)
//!                          none → NoAvailableBackend (nothing recorded)
//!     EXECUTING_PRIMARY  → work(handle), timed, recorded
//!                          ok → SUCCEEDED
//!     EXECUTING_FALLBACK → resilience::select_fallback, work(handle), recorded
//!                          ok → SUCCEEDED (tagged fallback)
//!                          err → FallbackExhausted
//!                          no fallback → primary error
//! ```
//!
//! # Design Decisions
//! - Every attempt is recorded before its error moves on
//! - Usage not reported by the backend is estimated from duration and tagged as such
//! - Budgets are advisories: logged and counted, never enforced

pub mod engine;
pub mod outcome;

pub use engine::{estimate_units, RoutingEngine};
pub use outcome::{Completion, DispatchPhase, Overview, ReconcileReport, TaskOutcome};
