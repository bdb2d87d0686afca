//! Active health checking.
//!
//! # Responsibilities
//! - Periodically probe every registered backend
//! - Update backend health state based on results
//! - Garbage-collect expired telemetry on each tick

use std::sync::Arc;
use std::time::Instant;

use futures_util::future::join_all;
use tokio::sync::broadcast;
use tokio::time::{self, MissedTickBehavior};

use crate::config::{HealthCheckConfig, TelemetryConfig};
use crate::observability::metrics;
use crate::registry::{BackendEntry, BackendRegistry};

/// Outcome of probing one backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    Healthy,
    Unhealthy,
    /// A probe for this backend was already in flight.
    Skipped,
}

pub struct HealthProber {
    registry: Arc<BackendRegistry>,
    config: HealthCheckConfig,
    telemetry: TelemetryConfig,
}

impl HealthProber {
    pub fn new(
        registry: Arc<BackendRegistry>,
        config: HealthCheckConfig,
        telemetry: TelemetryConfig,
    ) -> Self {
        Self {
            registry,
            config,
            telemetry,
        }
    }

    /// Probe on every interval tick until `shutdown` fires.
    ///
    /// The first tick completes immediately, so backends are probed once at startup.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        if !self.config.enabled {
            tracing::info!("Active health checks disabled");
            return;
        }

        tracing::info!(
            interval_secs = self.config.interval_secs,
            timeout_secs = self.config.timeout_secs,
            unhealthy_threshold = self.config.unhealthy_threshold,
            "Health prober starting"
        );

        let mut ticker = time::interval(self.config.interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.check_all().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Health prober received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Probe all backends concurrently, then prune expired telemetry.
    pub async fn check_all(&self) -> Vec<(String, ProbeOutcome)> {
        let entries = self.registry.entries();

        let outcomes = join_all(entries.iter().map(|entry| async move {
            (entry.id().to_string(), self.check_one(entry).await)
        }))
        .await;

        let now = Instant::now();
        let retention = self.telemetry.retention();
        for entry in &entries {
            let pruned = entry.telemetry.prune(now, retention);
            if pruned > 0 {
                tracing::debug!(backend_id = %entry.id(), pruned, "Expired execution records dropped");
            }
        }

        outcomes
    }

    /// Probe one backend and write the result to its health state.
    pub async fn check_one(&self, entry: &BackendEntry) -> ProbeOutcome {
        let Some(_slot) = entry.health.try_begin_probe() else {
            tracing::debug!(backend_id = %entry.id(), "Probe already in flight, skipping");
            return ProbeOutcome::Skipped;
        };

        let handle = entry.binding().handle.clone();
        let started = Instant::now();
        let result = match time::timeout(self.config.timeout(), handle.probe()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err(format!(
                "probe timed out after {} ms",
                self.config.timeout().as_millis()
            )),
        };
        let elapsed = started.elapsed();
        metrics::record_probe(entry.id(), elapsed, result.is_ok());

        match result {
            Ok(()) => {
                if entry.health.mark_success(elapsed) {
                    tracing::info!(
                        backend_id = %entry.id(),
                        latency_ms = elapsed.as_millis() as u64,
                        "Backend recovered"
                    );
                }
            }
            Err(reason) => {
                tracing::warn!(backend_id = %entry.id(), error = %reason, "Health probe failed");
                let became_unhealthy = entry.health.mark_failure(
                    reason,
                    self.config.unhealthy_threshold,
                    self.config.max_recent_issues,
                );
                if became_unhealthy {
                    tracing::warn!(
                        backend_id = %entry.id(),
                        consecutive_failures = entry.health.consecutive_failures(),
                        "Backend marked unhealthy"
                    );
                }
            }
        }

        let healthy = entry.health.is_healthy();
        metrics::record_backend_health(entry.id(), healthy);
        if healthy {
            ProbeOutcome::Healthy
        } else {
            ProbeOutcome::Unhealthy
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{
        BackendError, BackendFactory, BackendHandle, BackendRequest, BackendResponse,
    };
    use crate::config::BackendConfig;
    use crate::health::HealthState;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    /// Probe result controlled by a shared flag; "slow" endpoints never answer.
    struct SwitchBackend {
        up: Arc<AtomicBool>,
        slow: bool,
    }

    #[async_trait]
    impl BackendHandle for SwitchBackend {
        fn kind(&self) -> &str {
            "switch"
        }

        async fn invoke(&self, _request: BackendRequest) -> Result<BackendResponse, BackendError> {
            Err(BackendError::Internal("not used".into()))
        }

        async fn probe(&self) -> Result<(), BackendError> {
            if self.slow {
                std::future::pending::<()>().await;
            }
            if self.up.load(Ordering::SeqCst) {
                Ok(())
            } else {
                Err(BackendError::Connection("connection refused".into()))
            }
        }
    }

    struct SwitchFactory {
        up: Arc<AtomicBool>,
    }

    impl BackendFactory for SwitchFactory {
        fn connect(&self, config: &BackendConfig) -> Result<Arc<dyn BackendHandle>, BackendError> {
            Ok(Arc::new(SwitchBackend {
                up: self.up.clone(),
                slow: config.endpoint.as_deref() == Some("slow"),
            }))
        }
    }

    fn prober(up: Arc<AtomicBool>, config: HealthCheckConfig) -> (HealthProber, Arc<BackendRegistry>) {
        let registry = Arc::new(BackendRegistry::new(Arc::new(SwitchFactory { up })));
        let prober = HealthProber::new(registry.clone(), config, TelemetryConfig::default());
        (prober, registry)
    }

    #[tokio::test]
    async fn test_failure_then_recovery() {
        let up = Arc::new(AtomicBool::new(false));
        let (prober, registry) = prober(up.clone(), HealthCheckConfig::default());
        registry.register(BackendConfig::new("a", ["x"])).unwrap();
        let entry = registry.get("a").unwrap();

        assert_eq!(prober.check_one(&entry).await, ProbeOutcome::Unhealthy);
        let record = entry.health.record("a");
        assert!(!record.is_healthy);
        assert_eq!(record.recent_issues.len(), 1);
        assert!(record.recent_issues[0].contains("connection refused"));

        up.store(true, Ordering::SeqCst);
        assert_eq!(prober.check_one(&entry).await, ProbeOutcome::Healthy);
        assert_eq!(entry.health.state(), HealthState::Healthy);
        assert!(entry.health.record("a").recent_issues.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_timeout_counts_as_failure() {
        let up = Arc::new(AtomicBool::new(true));
        let (prober, registry) = prober(up, HealthCheckConfig::default());
        registry
            .register(BackendConfig::new("a", ["x"]).with_endpoint("slow"))
            .unwrap();
        let entry = registry.get("a").unwrap();

        assert_eq!(prober.check_one(&entry).await, ProbeOutcome::Unhealthy);
        assert!(entry.health.record("a").recent_issues[0].contains("timed out"));
    }

    #[tokio::test]
    async fn test_in_flight_probe_is_skipped() {
        let up = Arc::new(AtomicBool::new(true));
        let (prober, registry) = prober(up, HealthCheckConfig::default());
        registry.register(BackendConfig::new("a", ["x"])).unwrap();
        let entry = registry.get("a").unwrap();

        let _held = entry.health.try_begin_probe().unwrap();
        assert_eq!(prober.check_one(&entry).await, ProbeOutcome::Skipped);
        assert_eq!(entry.health.state(), HealthState::Unknown);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_on_shutdown() {
        let up = Arc::new(AtomicBool::new(false));
        let config = HealthCheckConfig {
            interval_secs: 1,
            ..Default::default()
        };
        let (prober, registry) = prober(up, config);
        registry.register(BackendConfig::new("a", ["x"])).unwrap();

        let (tx, rx) = broadcast::channel(1);
        let task = tokio::spawn(prober.run(rx));

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!registry.get("a").unwrap().health.is_healthy());

        tx.send(()).unwrap();
        task.await.unwrap();
    }
}
