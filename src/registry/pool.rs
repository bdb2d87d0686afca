//! Backend registry.
//!
//! # Responsibilities
//! - Validate and register backends, building their handles first
//! - Merge partial updates, rebuilding the handle when the connection changes
//! - Remove backends together with their telemetry and health
//! - Hand out entries in registration order

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::backend::BackendFactory;
use crate::config::validation::validate_backend;
use crate::config::{BackendConfig, BackendUpdate};
use crate::error::{EngineError, EngineResult};
use crate::observability::metrics;
use crate::registry::backend::{BackendEntry, Binding};

/// Owns every registered backend.
///
/// Entries live in a sharded map; per-backend state is synchronized inside
/// each entry, so operations on unrelated backends do not contend.
pub struct BackendRegistry {
    entries: DashMap<String, Arc<BackendEntry>>,
    next_seq: AtomicU64,
    factory: Arc<dyn BackendFactory>,
}

impl BackendRegistry {
    pub fn new(factory: Arc<dyn BackendFactory>) -> Self {
        Self {
            entries: DashMap::new(),
            next_seq: AtomicU64::new(0),
            factory,
        }
    }

    /// Register a backend.
    ///
    /// Fails with [`EngineError::Config`] on invalid input, a duplicate id,
    /// or a handle that cannot be built. The registry is unchanged on failure.
    pub fn register(&self, config: BackendConfig) -> EngineResult<()> {
        validate_backend(&config).map_err(EngineError::from_validation)?;

        if self.entries.contains_key(&config.id) {
            return Err(EngineError::Config(format!(
                "backend '{}' is already registered",
                config.id
            )));
        }

        let handle = self.factory.connect(&config).map_err(|e| {
            EngineError::Config(format!(
                "backend '{}' handle could not be constructed: {}",
                config.id, e
            ))
        })?;

        match self.entries.entry(config.id.clone()) {
            Entry::Occupied(_) => Err(EngineError::Config(format!(
                "backend '{}' is already registered",
                config.id
            ))),
            Entry::Vacant(slot) => {
                let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
                tracing::info!(
                    backend_id = %config.id,
                    kind = handle.kind(),
                    priority = config.priority,
                    capabilities = ?config.capabilities,
                    "Backend registered"
                );
                slot.insert(Arc::new(BackendEntry::new(seq, config, handle)));
                metrics::record_registered_backends(self.entries.len());
                Ok(())
            }
        }
    }

    /// Remove a backend with its telemetry and health. Unknown ids are ignored.
    pub fn unregister(&self, id: &str) -> bool {
        let removed = self.entries.remove(id).is_some();
        if removed {
            tracing::info!(backend_id = %id, "Backend unregistered");
            metrics::record_registered_backends(self.entries.len());
        }
        removed
    }

    /// Merge `update` into a backend's config.
    ///
    /// When the connection identity changes the handle is rebuilt first; if
    /// that fails the previous binding stays in place and
    /// [`EngineError::BackendUnavailable`] is returned.
    pub fn update(&self, id: &str, update: &BackendUpdate) -> EngineResult<BackendConfig> {
        let entry = self
            .get(id)
            .ok_or_else(|| EngineError::UnknownBackend(id.to_string()))?;

        let _guard = entry.lock_updates();
        let merged = entry.config().merged(update);
        self.rebind_entry(&entry, merged)
    }

    /// Swap in a complete new config for a registered backend.
    ///
    /// Unlike [`update`](Self::update) this can clear optional fields. The
    /// entry keeps its telemetry, health and registration order, and failures
    /// leave the previous binding in place.
    pub fn replace(&self, config: BackendConfig) -> EngineResult<BackendConfig> {
        let entry = self
            .get(&config.id)
            .ok_or_else(|| EngineError::UnknownBackend(config.id.clone()))?;

        let _guard = entry.lock_updates();
        self.rebind_entry(&entry, config)
    }

    // Caller holds the entry's update lock.
    fn rebind_entry(&self, entry: &BackendEntry, next: BackendConfig) -> EngineResult<BackendConfig> {
        validate_backend(&next).map_err(EngineError::from_validation)?;

        let current = entry.binding();
        let handle = if next.same_connection(&current.config) {
            current.handle.clone()
        } else {
            match self.factory.connect(&next) {
                Ok(handle) => handle,
                Err(reason) => {
                    tracing::warn!(
                        backend_id = %entry.id(),
                        error = %reason,
                        "Backend handle rebuild failed, keeping previous configuration"
                    );
                    return Err(EngineError::BackendUnavailable {
                        backend_id: entry.id().to_string(),
                        reason,
                    });
                }
            }
        };

        entry.rebind(Binding {
            config: next.clone(),
            handle,
        });
        tracing::info!(backend_id = %entry.id(), "Backend updated");
        Ok(next)
    }

    pub fn get(&self, id: &str) -> Option<Arc<BackendEntry>> {
        self.entries.get(id).map(|r| r.value().clone())
    }

    /// All entries, in registration order.
    pub fn entries(&self) -> Vec<Arc<BackendEntry>> {
        let mut all: Vec<_> = self.entries.iter().map(|r| r.value().clone()).collect();
        all.sort_by_key(|e| e.seq());
        all
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::testing::IdleBackend;
    use crate::backend::{BackendError, BackendHandle};
    use std::sync::atomic::AtomicUsize;

    /// Refuses endpoints containing "bad" and counts connections.
    #[derive(Default)]
    struct PickyFactory {
        connects: AtomicUsize,
    }

    impl BackendFactory for PickyFactory {
        fn connect(&self, config: &BackendConfig) -> Result<Arc<dyn BackendHandle>, BackendError> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            match config.endpoint.as_deref() {
                Some(e) if e.contains("bad") => Err(BackendError::Connection(format!("refused {e}"))),
                _ => Ok(Arc::new(IdleBackend)),
            }
        }
    }

    fn registry() -> (BackendRegistry, Arc<PickyFactory>) {
        let factory = Arc::new(PickyFactory::default());
        (BackendRegistry::new(factory.clone()), factory)
    }

    #[test]
    fn test_register_and_order() {
        let (registry, _) = registry();
        registry.register(BackendConfig::new("b", ["x"])).unwrap();
        registry.register(BackendConfig::new("a", ["x"])).unwrap();

        let ids: Vec<_> = registry.entries().iter().map(|e| e.id().to_string()).collect();
        assert_eq!(ids, vec!["b", "a"]);

        let entry = registry.get("a").unwrap();
        assert!(entry.health.is_healthy());
        assert_eq!(entry.telemetry.snapshot().success_rate, 1.0);
    }

    #[test]
    fn test_register_rejects_invalid_input() {
        let (registry, factory) = registry();

        let err = registry
            .register(BackendConfig::new("empty", Vec::<String>::new()))
            .unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));

        let err = registry
            .register(BackendConfig::new("neg", ["x"]).with_cost_per_unit(-0.1))
            .unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));

        let err = registry
            .register(BackendConfig::new("zero", ["x"]).with_max_throughput(0))
            .unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));

        assert!(registry.is_empty());
        assert_eq!(factory.connects.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_register_fails_when_handle_cannot_be_built() {
        let (registry, _) = registry();
        let err = registry
            .register(BackendConfig::new("a", ["x"]).with_endpoint("http://bad"))
            .unwrap_err();
        assert!(matches!(err, EngineError::Config(msg) if msg.contains("could not be constructed")));
        assert!(registry.get("a").is_none());
    }

    #[test]
    fn test_duplicate_registration() {
        let (registry, _) = registry();
        registry.register(BackendConfig::new("a", ["x"])).unwrap();
        let err = registry.register(BackendConfig::new("a", ["y"])).unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
        assert!(registry.get("a").unwrap().config().capabilities.contains("x"));
    }

    #[test]
    fn test_unregister_is_idempotent() {
        let (registry, _) = registry();
        registry.register(BackendConfig::new("a", ["x"])).unwrap();
        assert!(registry.unregister("a"));
        assert!(!registry.unregister("a"));
        assert!(!registry.unregister("never-registered"));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_update_without_connection_change_keeps_handle() {
        let (registry, factory) = registry();
        registry
            .register(BackendConfig::new("a", ["x"]).with_endpoint("http://ok"))
            .unwrap();
        let before = registry.get("a").unwrap().binding();

        let update = BackendUpdate {
            priority: Some(7),
            ..Default::default()
        };
        let merged = registry.update("a", &update).unwrap();
        assert_eq!(merged.priority, 7);

        let after = registry.get("a").unwrap().binding();
        assert!(Arc::ptr_eq(&before.handle, &after.handle));
        assert_eq!(factory.connects.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failed_rebuild_restores_previous_binding() {
        let (registry, _) = registry();
        registry
            .register(BackendConfig::new("a", ["x"]).with_priority(1).with_endpoint("http://ok"))
            .unwrap();

        let update = BackendUpdate {
            priority: Some(9),
            endpoint: Some("http://bad".into()),
            ..Default::default()
        };
        let err = registry.update("a", &update).unwrap_err();
        assert!(matches!(err, EngineError::BackendUnavailable { ref backend_id, .. } if backend_id == "a"));

        let config = registry.get("a").unwrap().config();
        assert_eq!(config.priority, 1);
        assert_eq!(config.endpoint.as_deref(), Some("http://ok"));
    }

    #[test]
    fn test_replace_clears_optional_fields() {
        let (registry, _) = registry();
        registry
            .register(
                BackendConfig::new("a", ["x"])
                    .with_endpoint("http://ok")
                    .with_credential_env("TOKEN"),
            )
            .unwrap();
        let seq = registry.get("a").unwrap().seq();

        let replaced = registry
            .replace(BackendConfig::new("a", ["x"]).with_endpoint("http://ok"))
            .unwrap();
        assert_eq!(replaced.credential_env, None);

        let entry = registry.get("a").unwrap();
        assert_eq!(entry.seq(), seq);
        assert_eq!(entry.config().credential_env, None);
    }

    #[test]
    fn test_failed_replace_keeps_backend() {
        let (registry, _) = registry();
        registry
            .register(
                BackendConfig::new("a", ["x"])
                    .with_endpoint("http://ok")
                    .with_credential_env("TOKEN"),
            )
            .unwrap();

        let err = registry
            .replace(BackendConfig::new("a", ["x"]).with_endpoint("http://bad"))
            .unwrap_err();
        assert!(matches!(err, EngineError::BackendUnavailable { .. }));

        let config = registry.get("a").unwrap().config();
        assert_eq!(config.endpoint.as_deref(), Some("http://ok"));
        assert_eq!(config.credential_env.as_deref(), Some("TOKEN"));
        assert!(matches!(
            registry.replace(BackendConfig::new("ghost", ["x"])),
            Err(EngineError::UnknownBackend(_))
        ));
    }

    #[test]
    fn test_invalid_update_is_config_error() {
        let (registry, _) = registry();
        registry.register(BackendConfig::new("a", ["x"])).unwrap();

        let update = BackendUpdate {
            max_throughput_per_minute: Some(0),
            ..Default::default()
        };
        assert!(matches!(registry.update("a", &update), Err(EngineError::Config(_))));
        assert!(matches!(
            registry.update("ghost", &BackendUpdate::default()),
            Err(EngineError::UnknownBackend(_))
        ));
    }
}
