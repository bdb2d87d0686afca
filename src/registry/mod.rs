//! Backend registry subsystem.
//!
//! # Data Flow
//! ```text
//! register(config)
//!     → validate (config/validation.rs)
//!     → BackendFactory::connect (build handle)
//!     → pool.rs inserts BackendEntry { binding, telemetry, health }
//!
//! update(id, partial)
//!     → merge + validate
//!     → rebuild handle if endpoint/credential changed
//!     → atomic swap of the entry's binding (or no change at all)
//!
//! unregister(id)
//!     → entry removed; telemetry and health go with it
//! ```
//!
//! # Design Decisions
//! - One entry per backend holds everything keyed by its id
//! - Config and handle are swapped together so readers never see a mix
//! - Registration order is recorded for deterministic tie-breaking

pub mod backend;
pub mod pool;

pub use crate::config::{BackendConfig, BackendUpdate};
pub use backend::{BackendEntry, Binding};
pub use pool::BackendRegistry;
