//! Backend execution interface.
//!
//! # Data Flow
//! ```text
//! BackendConfig (registry)
//!     → BackendFactory::connect (build handle, validate credentials)
//!     → Arc<dyn BackendHandle> bound to the registry entry
//!
//! Dispatcher:  unit-of-work(handle) → handle.invoke(request)
//! Prober:      handle.probe()
//! ```
//!
//! # Design Decisions
//! - Handles are built once per connection identity and shared via Arc
//! - Every execution problem surfaces as a categorised BackendError
//! - Probes are cheap and side-effect free; they never carry task payloads

pub mod handle;
pub mod http;
#[cfg(test)]
pub(crate) mod testing;

pub use handle::{BackendError, BackendFactory, BackendHandle, BackendRequest, BackendResponse};
pub use http::{HttpBackend, HttpBackendFactory};
