//! Rolling execution telemetry.
//!
//! # Data Flow
//! ```text
//! Dispatcher attempt completes
//!     → ExecutionRecord (task, backend, timings, cost, units)
//!     → store.rs appends to the backend's window, recomputes rates
//!
//! Readers:
//!     → selector: executions in the last rate window (admission control)
//!     → scorer: success/error rates
//!     → overview: last-hour aggregates
//! ```
//!
//! # Design Decisions
//! - One lock per backend, never a global one
//! - Counters are cumulative; records are bounded by the retention window
//! - Rate queries are computed fresh on every call

pub mod record;
pub mod store;

pub use record::{ExecutionRecord, TelemetrySnapshot, UsageSource, WindowSummary};
pub use store::BackendTelemetry;
