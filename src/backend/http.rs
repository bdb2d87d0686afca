//! HTTP backend adapter.
//!
//! # Protocol
//! - Execution: `POST {endpoint}/invoke` with a JSON [`BackendRequest`]
//! - Probe: `GET {endpoint}/health`, any 2xx is healthy
//! - Optional bearer credential read from an environment variable once,
//!   when the handle is built

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use url::Url;

use crate::backend::handle::{
    BackendError, BackendFactory, BackendHandle, BackendRequest, BackendResponse,
};
use crate::registry::BackendConfig;

/// A backend reachable over HTTP.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    /// Pre-parsed base URL.
    base_url: Url,
    credential: Option<String>,
    client: Client,
}

impl HttpBackend {
    /// Build a handle for `endpoint`.
    pub fn new(endpoint: &str, credential: Option<String>) -> Result<Self, BackendError> {
        let base_url = Url::parse(endpoint)
            .map_err(|e| BackendError::Request(format!("invalid endpoint '{}': {}", endpoint, e)))?;

        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(BackendError::Request(format!(
                "unsupported scheme '{}' in endpoint '{}'",
                base_url.scheme(),
                endpoint
            )));
        }

        let client = Client::builder()
            .build()
            .map_err(|e| BackendError::Internal(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url,
            credential,
            client,
        })
    }

    /// Base URL the handle talks to.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.as_str().trim_end_matches('/'), path)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.credential {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

fn map_send_error(e: reqwest::Error) -> BackendError {
    if e.is_connect() {
        BackendError::Connection(e.to_string())
    } else {
        BackendError::Request(e.to_string())
    }
}

#[async_trait]
impl BackendHandle for HttpBackend {
    fn kind(&self) -> &str {
        "http"
    }

    async fn invoke(&self, request: BackendRequest) -> Result<BackendResponse, BackendError> {
        let response = self
            .authorize(self.client.post(self.url_for("invoke")))
            .json(&request)
            .send()
            .await
            .map_err(map_send_error)?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(BackendError::RateLimited);
        }
        if !status.is_success() {
            return Err(BackendError::Status(status.as_u16()));
        }

        response
            .json::<BackendResponse>()
            .await
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))
    }

    async fn probe(&self) -> Result<(), BackendError> {
        let response = self
            .authorize(self.client.get(self.url_for("health")))
            .header("user-agent", "backend-router-probe")
            .send()
            .await
            .map_err(map_send_error)?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(BackendError::Status(response.status().as_u16()))
        }
    }
}

/// Factory producing [`HttpBackend`] handles from backend configuration.
#[derive(Debug, Default, Clone)]
pub struct HttpBackendFactory;

impl HttpBackendFactory {
    pub fn new() -> Self {
        Self
    }
}

impl BackendFactory for HttpBackendFactory {
    fn connect(&self, config: &BackendConfig) -> Result<Arc<dyn BackendHandle>, BackendError> {
        let endpoint = config.endpoint.as_deref().ok_or_else(|| {
            BackendError::Request(format!("backend '{}' has no endpoint", config.id))
        })?;

        let credential = match &config.credential_env {
            Some(var) => Some(std::env::var(var).map_err(|_| {
                BackendError::Request(format!(
                    "credential variable '{}' for backend '{}' is not set",
                    var, config.id
                ))
            })?),
            None => None,
        };

        let backend = HttpBackend::new(endpoint, credential)?;
        tracing::debug!(backend_id = %config.id, url = %backend.base_url, "HTTP backend handle built");
        Ok(Arc::new(backend))
    }
}
