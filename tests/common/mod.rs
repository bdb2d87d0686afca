//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use backend_router::backend::{
    BackendError, BackendFactory, BackendHandle, BackendRequest, BackendResponse,
};
use backend_router::config::{BackendConfig, RouterConfig};
use backend_router::dispatch::{Completion, RoutingEngine};

/// In-memory backend whose invoke and probe results are switched by the test.
pub struct ScriptedBackend {
    pub id: String,
    invoke_error: Mutex<Option<BackendError>>,
    probe_ok: AtomicBool,
    reported_units: Mutex<Option<u64>>,
    pub invocations: AtomicUsize,
    pub probes: AtomicUsize,
}

impl ScriptedBackend {
    fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            invoke_error: Mutex::new(None),
            probe_ok: AtomicBool::new(true),
            reported_units: Mutex::new(None),
            invocations: AtomicUsize::new(0),
            probes: AtomicUsize::new(0),
        }
    }

    pub fn fail_with(&self, error: BackendError) {
        *self.invoke_error.lock().unwrap() = Some(error);
    }

    pub fn succeed(&self) {
        *self.invoke_error.lock().unwrap() = None;
    }

    pub fn set_probe_ok(&self, ok: bool) {
        self.probe_ok.store(ok, Ordering::SeqCst);
    }

    pub fn report_units(&self, units: Option<u64>) {
        *self.reported_units.lock().unwrap() = units;
    }

    pub fn invocations(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BackendHandle for ScriptedBackend {
    fn kind(&self) -> &str {
        "scripted"
    }

    async fn invoke(&self, request: BackendRequest) -> Result<BackendResponse, BackendError> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.invoke_error.lock().unwrap().clone() {
            return Err(error);
        }
        Ok(BackendResponse {
            body: json!({ "backend": self.id, "task": request.task_id }),
            units_used: *self.reported_units.lock().unwrap(),
        })
    }

    async fn probe(&self) -> Result<(), BackendError> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        if self.probe_ok.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(BackendError::Connection(format!("{} is down", self.id)))
        }
    }
}

/// Hands out one [`ScriptedBackend`] per backend id.
///
/// Endpoints containing "unreachable" fail to connect.
#[derive(Default)]
pub struct MockFactory {
    backends: Mutex<HashMap<String, Arc<ScriptedBackend>>>,
    pub connects: AtomicUsize,
}

impl MockFactory {
    pub fn backend(&self, id: &str) -> Arc<ScriptedBackend> {
        self.backends
            .lock()
            .unwrap()
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(ScriptedBackend::new(id)))
            .clone()
    }
}

impl BackendFactory for MockFactory {
    fn connect(&self, config: &BackendConfig) -> Result<Arc<dyn BackendHandle>, BackendError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if let Some(endpoint) = config.endpoint.as_deref() {
            if endpoint.contains("unreachable") {
                return Err(BackendError::Connection(format!("cannot reach {endpoint}")));
            }
        }
        Ok(self.backend(&config.id))
    }
}

/// Engine over scripted backends, prober disabled.
pub fn engine_with(backends: Vec<BackendConfig>) -> (RoutingEngine, Arc<MockFactory>) {
    let mut config = RouterConfig::default();
    config.health_check.enabled = false;
    config.backends = backends;
    let factory = Arc::new(MockFactory::default());
    let engine = RoutingEngine::new(config, factory.clone()).unwrap();
    (engine, factory)
}

/// Unit of work: forward a fixed request to whichever backend was chosen.
pub async fn call(handle: Arc<dyn BackendHandle>) -> Result<Completion<Value>, BackendError> {
    let response = handle
        .invoke(BackendRequest {
            task_id: "t".into(),
            task_type: "test".into(),
            payload: json!({}),
        })
        .await?;
    Ok(match response.units_used {
        Some(units) => Completion::with_units(response.body, units),
        None => Completion::new(response.body),
    })
}

/// Start a minimal HTTP/1.1 server on an ephemeral port.
///
/// `respond` receives the request line (e.g. `POST /invoke HTTP/1.1`) and the
/// full request head and returns a status code and JSON body.
pub async fn start_http_backend<F, Fut>(respond: F) -> SocketAddr
where
    F: Fn(String, String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let respond = Arc::new(respond);

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let respond = respond.clone();
            tokio::spawn(async move {
                let Some(head) = read_request(&mut socket).await else {
                    return;
                };
                let line = head.lines().next().unwrap_or_default().to_string();
                let (status, body) = respond(line, head).await;
                let reason = match status {
                    200 => "OK",
                    429 => "Too Many Requests",
                    500 => "Internal Server Error",
                    503 => "Service Unavailable",
                    _ => "Unknown",
                };
                let response = format!(
                    "HTTP/1.1 {status} {reason}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    addr
}

/// Read the request head and drain any body announced by Content-Length.
async fn read_request(socket: &mut tokio::net::TcpStream) -> Option<String> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(end) = find_head_end(&buf) {
            let head = String::from_utf8_lossy(&buf[..end]).to_string();
            let body_len = content_length(&head);
            while buf.len() < end + 4 + body_len {
                let n = socket.read(&mut chunk).await.ok()?;
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
            }
            return Some(head);
        }
    }
}

fn find_head_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

fn content_length(head: &str) -> usize {
    head.lines()
        .filter_map(|l| l.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse().ok())
        .unwrap_or(0)
}
