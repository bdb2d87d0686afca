//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Primary attempt fails:
//!     → attempt recorded in telemetry
//!     → fallback.rs picks at most one alternate backend
//!     → dispatcher runs the unit of work once more, or propagates the primary error
//! ```
//!
//! # Design Decisions
//! - One hop only; broader retry/backoff belongs to the caller
//! - The dispatcher imposes no timeout; the unit of work owns its deadline

pub mod fallback;

pub use fallback::select_fallback;
