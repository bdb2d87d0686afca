//! Backend handle trait and error definitions.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::registry::BackendConfig;

/// Errors raised while invoking or probing a backend.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum BackendError {
    /// Could not reach the backend.
    #[error("connection failed: {0}")]
    Connection(String),

    /// The request could not be built or sent.
    #[error("request failed: {0}")]
    Request(String),

    /// The backend answered with a non-success status.
    #[error("backend returned status {0}")]
    Status(u16),

    /// The backend rejected the call because of its own rate limits.
    #[error("rate limited by backend")]
    RateLimited,

    /// The call did not finish within the caller's deadline.
    #[error("timed out after {0} ms")]
    Timeout(u64),

    /// The backend answered but the body could not be understood.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Anything else.
    #[error("internal error: {0}")]
    Internal(String),
}

/// A unit of work as sent over the execution interface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendRequest {
    pub task_id: String,
    pub task_type: String,
    pub payload: serde_json::Value,
}

/// Raw backend answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendResponse {
    pub body: serde_json::Value,
    /// Units the backend reports having consumed, when it reports them.
    #[serde(default)]
    pub units_used: Option<u64>,
}

/// A bound connection to one computation backend.
#[async_trait]
pub trait BackendHandle: Send + Sync {
    /// Short human-readable kind, used in logs.
    fn kind(&self) -> &str;

    /// Execute a request.
    async fn invoke(&self, request: BackendRequest) -> Result<BackendResponse, BackendError>;

    /// Cheap liveness check.
    async fn probe(&self) -> Result<(), BackendError>;
}

/// Builds handles from backend configuration.
///
/// Called at registration and whenever an update changes the backend's
/// connection identity. Returning an error leaves the registry untouched.
pub trait BackendFactory: Send + Sync {
    fn connect(&self, config: &BackendConfig) -> Result<Arc<dyn BackendHandle>, BackendError>;
}
