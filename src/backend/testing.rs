//! In-memory backends for unit tests.

use std::sync::Arc;

use async_trait::async_trait;

use crate::backend::{BackendError, BackendFactory, BackendHandle, BackendRequest, BackendResponse};
use crate::config::BackendConfig;
use crate::registry::BackendRegistry;

/// Always passes probes and never completes work.
pub(crate) struct IdleBackend;

#[async_trait]
impl BackendHandle for IdleBackend {
    fn kind(&self) -> &str {
        "idle"
    }

    async fn invoke(&self, _request: BackendRequest) -> Result<BackendResponse, BackendError> {
        Err(BackendError::Internal("idle".into()))
    }

    async fn probe(&self) -> Result<(), BackendError> {
        Ok(())
    }
}

pub(crate) struct IdleFactory;

impl BackendFactory for IdleFactory {
    fn connect(&self, _config: &BackendConfig) -> Result<Arc<dyn BackendHandle>, BackendError> {
        Ok(Arc::new(IdleBackend))
    }
}

/// Registry of idle backends, registered in the given order.
pub(crate) fn idle_registry(configs: Vec<BackendConfig>) -> BackendRegistry {
    let registry = BackendRegistry::new(Arc::new(IdleFactory));
    for config in configs {
        registry.register(config).unwrap();
    }
    registry
}
