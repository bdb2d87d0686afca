//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Registry, prober and dispatcher produce:
//!     → logging.rs (structured log events with backend_id / task_id fields)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured fields, never interpolated ids
//! - Metrics are cheap (atomic increments) and optional

pub mod logging;
pub mod metrics;
