//! Engine error taxonomy.

use thiserror::Error;

use crate::backend::BackendError;
use crate::config::ValidationError;

/// Errors surfaced by the routing engine.
///
/// Callers can tell "nothing was tried" ([`EngineError::NoAvailableBackend`])
/// apart from "something was tried and failed" ([`EngineError::Backend`],
/// [`EngineError::FallbackExhausted`]).
#[derive(Debug, Error)]
pub enum EngineError {
    /// Invalid registration input. The registry is unchanged.
    #[error("configuration error: {0}")]
    Config(String),

    /// No backend is registered under this id.
    #[error("unknown backend: {0}")]
    UnknownBackend(String),

    /// The task requirement cannot be routed as stated.
    #[error("invalid task requirement: {0}")]
    InvalidRequirement(String),

    /// The backend handle could not be (re)built. The previous binding stays in place.
    #[error("backend '{backend_id}' unavailable: {reason}")]
    BackendUnavailable { backend_id: String, reason: BackendError },

    /// No candidate survived capability, health and rate filtering.
    #[error("no available backend for capabilities [{}]", .required.join(", "))]
    NoAvailableBackend { required: Vec<String> },

    /// The selected backend failed and no fallback was eligible.
    #[error("backend '{backend_id}' failed: {source}")]
    Backend {
        backend_id: String,
        #[source]
        source: BackendError,
    },

    /// Both the primary and the fallback attempt failed.
    #[error("fallback '{fallback_backend}' failed after primary '{primary_backend}' failed: {fallback}")]
    FallbackExhausted {
        primary_backend: String,
        primary: BackendError,
        fallback_backend: String,
        #[source]
        fallback: BackendError,
    },
}

impl EngineError {
    pub(crate) fn from_validation(errors: Vec<ValidationError>) -> Self {
        let joined = errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        EngineError::Config(joined)
    }

    /// True when at least one backend was actually invoked.
    pub fn was_attempted(&self) -> bool {
        matches!(
            self,
            EngineError::Backend { .. } | EngineError::FallbackExhausted { .. }
        )
    }
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
