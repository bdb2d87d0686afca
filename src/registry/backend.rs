//! Backend abstraction.
//!
//! # Responsibilities
//! - Represent a single registered backend
//! - Hold its current configuration and handle as one atomically swapped binding
//! - Own the backend's telemetry window and health state, so removing the
//!   entry removes all three together

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use arc_swap::ArcSwap;

use crate::backend::BackendHandle;
use crate::config::BackendConfig;
use crate::health::state::BackendHealth;
use crate::telemetry::BackendTelemetry;

/// Configuration plus the handle built from it.
pub struct Binding {
    pub config: BackendConfig,
    pub handle: Arc<dyn BackendHandle>,
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("config", &self.config)
            .field("handle", &self.handle.kind())
            .finish()
    }
}

/// A single registered backend.
#[derive(Debug)]
pub struct BackendEntry {
    id: String,
    /// Registration order, used as the final tie-breaker.
    seq: u64,
    binding: ArcSwap<Binding>,
    /// Serializes updates of this backend only.
    update_lock: Mutex<()>,
    pub telemetry: BackendTelemetry,
    pub health: BackendHealth,
}

impl BackendEntry {
    pub fn new(seq: u64, config: BackendConfig, handle: Arc<dyn BackendHandle>) -> Self {
        let id = config.id.clone();
        Self {
            telemetry: BackendTelemetry::new(&id),
            health: BackendHealth::new(),
            id,
            seq,
            binding: ArcSwap::from_pointee(Binding { config, handle }),
            update_lock: Mutex::new(()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Current binding. Config and handle are always read as a pair.
    pub fn binding(&self) -> Arc<Binding> {
        self.binding.load_full()
    }

    pub fn config(&self) -> BackendConfig {
        self.binding.load().config.clone()
    }

    pub(crate) fn lock_updates(&self) -> MutexGuard<'_, ()> {
        self.update_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn rebind(&self, binding: Binding) {
        self.binding.store(Arc::new(binding));
    }
}
