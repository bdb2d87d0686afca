//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! TaskRequirement (capabilities, complexity, budgets)
//!     → requirement.rs (validate)
//!     → selector.rs (capability ∩, healthy, under throughput cap)
//!     → scorer.rs (weighted score + tie-break chain)
//!     → Return: winning Candidate or nothing
//! ```
//!
//! # Design Decisions
//! - Partial capability match is enough to be a candidate
//! - Weights are policy, read from config on every selection
//! - Deterministic: same inputs always pick the same backend

pub mod requirement;
pub mod scorer;
pub mod selector;

pub use requirement::{ComplexityTier, TaskRequirement};
pub use scorer::{score, select_best, ScoreBreakdown};
pub use selector::{get_candidates, Candidate};
