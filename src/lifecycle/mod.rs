//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Engine construction:
//!     Shutdown::new() → prober subscribes → prober task spawned
//!
//! Shutdown (shutdown.rs):
//!     engine.shutdown() or Drop → broadcast → prober select! exits
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → binary calls engine.shutdown()
//! ```
//!
//! # Design Decisions
//! - Background tasks are owned by the engine, never free-running
//! - The signal is level-triggered: a second trigger is a no-op

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::{wait_for_termination, TerminationSignal};
