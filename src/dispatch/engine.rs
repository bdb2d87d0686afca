//! Routing engine façade.
//!
//! # Responsibilities
//! - Own the registry and the health prober task
//! - Run select → invoke → record → (single fallback) → record
//! - Answer telemetry, health and overview queries
//! - Reconcile the registry against a reloaded config

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use tokio::task::JoinHandle;

use crate::backend::{BackendError, BackendFactory, BackendHandle};
use crate::config::validation::validate_config;
use crate::config::{
    BackendConfig, BackendUpdate, HealthCheckConfig, RouterConfig, ScoringConfig, TelemetryConfig,
};
use crate::dispatch::outcome::{Completion, DispatchPhase, Overview, ReconcileReport, TaskOutcome};
use crate::error::{EngineError, EngineResult};
use crate::health::{HealthProber, HealthRecord};
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::registry::{BackendEntry, BackendRegistry, Binding};
use crate::resilience::select_fallback;
use crate::routing::{get_candidates, select_best, TaskRequirement};
use crate::telemetry::{ExecutionRecord, TelemetrySnapshot, UsageSource};

const OVERVIEW_HORIZON: Duration = Duration::from_secs(3600);

/// Units implied by a wall-clock duration: `ceil(ms / ms_per_unit)`, at least 1.
pub fn estimate_units(elapsed: Duration, ms_per_unit: u64) -> u64 {
    let ms = elapsed.as_millis() as u64;
    ms.div_ceil(ms_per_unit.max(1)).max(1)
}

/// The routing and fallback engine.
///
/// Construct inside a Tokio runtime: the health prober is spawned on
/// construction and stopped by [`RoutingEngine::shutdown`] or on drop.
pub struct RoutingEngine {
    registry: Arc<BackendRegistry>,
    policy: ArcSwap<ScoringConfig>,
    telemetry: ArcSwap<TelemetryConfig>,
    health_check: HealthCheckConfig,
    shutdown: Shutdown,
    prober: Mutex<Option<JoinHandle<()>>>,
}

impl RoutingEngine {
    pub fn new(config: RouterConfig, factory: Arc<dyn BackendFactory>) -> EngineResult<Self> {
        validate_config(&config).map_err(EngineError::from_validation)?;

        let registry = Arc::new(BackendRegistry::new(factory));
        for backend in config.backends {
            registry.register(backend)?;
        }

        let shutdown = Shutdown::new();
        let prober = if config.health_check.enabled {
            let runtime = tokio::runtime::Handle::try_current().map_err(|e| {
                EngineError::Config(format!("health prober needs a Tokio runtime: {e}"))
            })?;
            let prober = HealthProber::new(
                registry.clone(),
                config.health_check.clone(),
                config.telemetry.clone(),
            );
            Some(runtime.spawn(prober.run(shutdown.subscribe())))
        } else {
            tracing::info!("Active health checks disabled");
            None
        };

        tracing::info!(
            backends = registry.len(),
            prober = prober.is_some(),
            "Routing engine started"
        );

        Ok(Self {
            registry,
            policy: ArcSwap::from_pointee(config.scoring),
            telemetry: ArcSwap::from_pointee(config.telemetry),
            health_check: config.health_check,
            shutdown,
            prober: Mutex::new(prober),
        })
    }

    pub fn registry(&self) -> &Arc<BackendRegistry> {
        &self.registry
    }

    pub fn scoring_policy(&self) -> Arc<ScoringConfig> {
        self.policy.load_full()
    }

    pub fn register_backend(&self, config: BackendConfig) -> EngineResult<()> {
        self.registry.register(config)
    }

    /// Remove a backend; unknown ids are a no-op.
    pub fn unregister_backend(&self, id: &str) {
        self.registry.unregister(id);
    }

    pub fn update_backend(&self, id: &str, update: &BackendUpdate) -> EngineResult<BackendConfig> {
        self.registry.update(id, update)
    }

    /// Route `work` to the best backend for `requirement`, with at most one fallback hop.
    ///
    /// `work` is called once per attempt with the chosen backend's handle.
    /// The engine does not time it out; it only measures it.
    pub async fn execute_task<T, F, Fut>(
        &self,
        task_id: &str,
        task_type: &str,
        work: F,
        requirement: &TaskRequirement,
    ) -> EngineResult<TaskOutcome<T>>
    where
        F: Fn(Arc<dyn BackendHandle>) -> Fut,
        Fut: Future<Output = Result<Completion<T>, BackendError>>,
    {
        requirement.validate()?;
        let policy = self.policy.load_full();
        let telemetry = self.telemetry.load_full();

        tracing::debug!(task_id, task_type, phase = %DispatchPhase::Selecting, "Selecting backend");
        let candidates =
            get_candidates(&self.registry, requirement, Instant::now(), telemetry.rate_window());
        let Some((primary, breakdown)) = select_best(&candidates, requirement, &policy) else {
            tracing::debug!(
                task_id,
                required = ?requirement.required_capabilities,
                "No available backend"
            );
            metrics::record_no_candidate();
            return Err(EngineError::NoAvailableBackend {
                required: requirement.capability_list(),
            });
        };

        tracing::debug!(
            task_id,
            backend_id = %primary.id(),
            score = breakdown.total,
            phase = %DispatchPhase::ExecutingPrimary,
            "Dispatching to primary"
        );
        let primary_error = match self
            .attempt(task_id, &primary.entry, &primary.binding, &work, false, &telemetry)
            .await
        {
            Ok(outcome) => {
                self.check_budgets(task_id, &outcome, requirement, Some(breakdown.normalized(&policy)));
                return Ok(outcome);
            }
            Err(e) => e,
        };
        let primary_id = primary.id().to_string();

        let Some(fallback) = select_fallback(&self.registry, &primary_id) else {
            tracing::warn!(
                task_id,
                backend_id = %primary_id,
                error = %primary_error,
                phase = %DispatchPhase::FailedTerminal,
                "Primary failed, no fallback eligible"
            );
            return Err(EngineError::Backend {
                backend_id: primary_id,
                source: primary_error,
            });
        };

        tracing::info!(
            task_id,
            from = %primary_id,
            to = %fallback.id(),
            phase = %DispatchPhase::ExecutingFallback,
            "Falling back"
        );
        metrics::record_fallback(&primary_id, fallback.id());

        let binding = fallback.binding();
        match self
            .attempt(task_id, &fallback, &binding, &work, true, &telemetry)
            .await
        {
            Ok(mut outcome) => {
                outcome.fallback_from = Some(primary_id);
                self.check_budgets(task_id, &outcome, requirement, None);
                Ok(outcome)
            }
            Err(fallback_error) => {
                tracing::warn!(
                    task_id,
                    primary = %primary_id,
                    fallback = %fallback.id(),
                    error = %fallback_error,
                    phase = %DispatchPhase::FailedTerminal,
                    "Fallback failed"
                );
                Err(EngineError::FallbackExhausted {
                    primary_backend: primary_id,
                    primary: primary_error,
                    fallback_backend: fallback.id().to_string(),
                    fallback: fallback_error,
                })
            }
        }
    }

    /// Run one attempt and record it, success or failure.
    async fn attempt<T, F, Fut>(
        &self,
        task_id: &str,
        entry: &BackendEntry,
        binding: &Binding,
        work: &F,
        fallback: bool,
        telemetry: &TelemetryConfig,
    ) -> Result<TaskOutcome<T>, BackendError>
    where
        F: Fn(Arc<dyn BackendHandle>) -> Fut,
        Fut: Future<Output = Result<Completion<T>, BackendError>>,
    {
        let started_at = Instant::now();
        let result = work(binding.handle.clone()).await;
        let finished_at = Instant::now();
        let elapsed = finished_at.duration_since(started_at);

        match result {
            Ok(completion) => {
                let (units, usage) = match completion.units {
                    Some(units) => (units, UsageSource::Reported),
                    None => (
                        estimate_units(elapsed, telemetry.estimated_ms_per_unit),
                        UsageSource::Estimated,
                    ),
                };
                let cost = units as f64 * binding.config.cost_per_unit;

                entry.telemetry.record(
                    ExecutionRecord {
                        task_id: task_id.to_string(),
                        backend_id: entry.id().to_string(),
                        started_at,
                        finished_at,
                        success: true,
                        cost,
                        units,
                        fallback,
                    },
                    telemetry.retention(),
                );
                metrics::record_dispatch(entry.id(), "success", elapsed);
                tracing::info!(
                    task_id,
                    backend_id = %entry.id(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    cost,
                    units,
                    usage = ?usage,
                    phase = %DispatchPhase::Succeeded,
                    "Task succeeded"
                );

                Ok(TaskOutcome {
                    result: completion.value,
                    backend_id: entry.id().to_string(),
                    actual_cost: cost,
                    response_time: elapsed,
                    units_used: units,
                    usage,
                    fallback_from: None,
                })
            }
            Err(error) => {
                entry.telemetry.record(
                    ExecutionRecord {
                        task_id: task_id.to_string(),
                        backend_id: entry.id().to_string(),
                        started_at,
                        finished_at,
                        success: false,
                        cost: 0.0,
                        units: 0,
                        fallback,
                    },
                    telemetry.retention(),
                );
                metrics::record_dispatch(entry.id(), "failure", elapsed);
                tracing::warn!(
                    task_id,
                    backend_id = %entry.id(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    error = %error,
                    fallback,
                    "Backend attempt failed"
                );
                Err(error)
            }
        }
    }

    /// Log and count budget breaches. Never changes the outcome.
    fn check_budgets<T>(
        &self,
        task_id: &str,
        outcome: &TaskOutcome<T>,
        requirement: &TaskRequirement,
        quality: Option<f64>,
    ) {
        if let Some(max) = requirement.max_latency {
            if outcome.response_time > max {
                tracing::warn!(
                    task_id,
                    backend_id = %outcome.backend_id,
                    elapsed_ms = outcome.response_time.as_millis() as u64,
                    budget_ms = max.as_millis() as u64,
                    "Latency budget exceeded"
                );
                metrics::record_budget_exceeded(&outcome.backend_id, "latency");
            }
        }
        if let Some(max) = requirement.max_cost {
            if outcome.actual_cost > max {
                tracing::warn!(
                    task_id,
                    backend_id = %outcome.backend_id,
                    cost = outcome.actual_cost,
                    budget = max,
                    "Cost budget exceeded"
                );
                metrics::record_budget_exceeded(&outcome.backend_id, "cost");
            }
        }
        if let (Some(min), Some(quality)) = (requirement.min_quality, quality) {
            if quality < min {
                tracing::warn!(
                    task_id,
                    backend_id = %outcome.backend_id,
                    quality,
                    minimum = min,
                    "Selected backend below quality threshold"
                );
                metrics::record_budget_exceeded(&outcome.backend_id, "quality");
            }
        }
    }

    /// Record an execution that ran outside `execute_task`.
    pub fn record_completion(
        &self,
        backend_id: &str,
        success: bool,
        cost: f64,
        units: u64,
        duration: Duration,
    ) -> EngineResult<()> {
        let entry = self
            .registry
            .get(backend_id)
            .ok_or_else(|| EngineError::UnknownBackend(backend_id.to_string()))?;
        let finished_at = Instant::now();
        let started_at = finished_at.checked_sub(duration).unwrap_or(finished_at);

        entry.telemetry.record(
            ExecutionRecord {
                task_id: uuid::Uuid::new_v4().to_string(),
                backend_id: backend_id.to_string(),
                started_at,
                finished_at,
                success,
                cost,
                units,
                fallback: false,
            },
            self.telemetry.load().retention(),
        );
        Ok(())
    }

    /// Executions on `backend_id` inside the rate window, computed now.
    pub fn current_rate_per_minute(&self, backend_id: &str) -> EngineResult<usize> {
        let entry = self
            .registry
            .get(backend_id)
            .ok_or_else(|| EngineError::UnknownBackend(backend_id.to_string()))?;
        Ok(entry
            .telemetry
            .rate_at(Instant::now(), self.telemetry.load().rate_window()))
    }

    fn selected(&self, backend_id: Option<&str>) -> Vec<Arc<BackendEntry>> {
        match backend_id {
            Some(id) => self.registry.get(id).into_iter().collect(),
            None => self.registry.entries(),
        }
    }

    /// Telemetry for one backend, or all in registration order. Unknown ids yield nothing.
    pub fn get_metrics(&self, backend_id: Option<&str>) -> Vec<TelemetrySnapshot> {
        self.selected(backend_id)
            .iter()
            .map(|e| e.telemetry.snapshot())
            .collect()
    }

    pub fn get_health(&self, backend_id: Option<&str>) -> Vec<HealthRecord> {
        self.selected(backend_id)
            .iter()
            .map(|e| e.health.record(e.id()))
            .collect()
    }

    pub fn get_overview(&self) -> Overview {
        self.overview_at(Instant::now())
    }

    pub fn overview_at(&self, now: Instant) -> Overview {
        let entries = self.registry.entries();
        let total_backends = entries.len();
        let healthy_backends = entries.iter().filter(|e| e.health.is_healthy()).count();

        let (requests, cost, duration) = entries
            .iter()
            .map(|e| e.telemetry.summary_since(now, OVERVIEW_HORIZON))
            .fold((0u64, 0.0f64, Duration::ZERO), |(r, c, d), s| {
                (r + s.requests, c + s.cost, d + s.total_duration)
            });

        Overview {
            total_backends,
            healthy_backends,
            requests_last_hour: requests,
            cost_last_hour: cost,
            avg_response_time_ms: if requests == 0 {
                0.0
            } else {
                duration.as_secs_f64() * 1000.0 / requests as f64
            },
            health_score: if total_backends == 0 {
                0.0
            } else {
                healthy_backends as f64 / total_backends as f64
            },
        }
    }

    /// Bring the registry and policies in line with `config`.
    ///
    /// An invalid config is rejected as a whole. Otherwise each backend is
    /// reconciled independently and failures are reported, not propagated.
    /// Health check settings only take effect on restart.
    pub fn apply_config(&self, config: RouterConfig) -> EngineResult<ReconcileReport> {
        validate_config(&config).map_err(EngineError::from_validation)?;
        let mut report = ReconcileReport::default();

        for target in &config.backends {
            let Some(entry) = self.registry.get(&target.id) else {
                match self.registry.register(target.clone()) {
                    Ok(()) => report.registered.push(target.id.clone()),
                    Err(e) => report.failed.push((target.id.clone(), e.to_string())),
                }
                continue;
            };

            let current = entry.config();
            let update = BackendUpdate::between(&current, target);
            if current.merged(&update) != *target {
                // A cleared endpoint or credential cannot be expressed as a partial update.
                match self.registry.replace(target.clone()) {
                    Ok(_) => report.updated.push(target.id.clone()),
                    Err(e) => report.failed.push((target.id.clone(), e.to_string())),
                }
            } else if !update.is_empty() {
                match self.registry.update(&target.id, &update) {
                    Ok(_) => report.updated.push(target.id.clone()),
                    Err(e) => report.failed.push((target.id.clone(), e.to_string())),
                }
            }
        }

        for entry in self.registry.entries() {
            if !config.backends.iter().any(|b| b.id == entry.id()) {
                self.registry.unregister(entry.id());
                report.removed.push(entry.id().to_string());
            }
        }

        self.policy.store(Arc::new(config.scoring));
        self.telemetry.store(Arc::new(config.telemetry));
        if config.health_check != self.health_check {
            tracing::warn!("Health check settings changed; restart to apply them");
        }

        for (id, reason) in &report.failed {
            tracing::error!(backend_id = %id, error = %reason, "Backend reconciliation failed");
        }
        tracing::info!(
            registered = report.registered.len(),
            updated = report.updated.len(),
            removed = report.removed.len(),
            failed = report.failed.len(),
            "Configuration applied"
        );
        Ok(report)
    }

    /// Stop the prober and wait for it to exit.
    pub async fn shutdown(&self) {
        self.shutdown.trigger();
        let handle = self
            .prober
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Health prober task ended abnormally");
            }
        }
        tracing::info!("Routing engine stopped");
    }
}

impl Drop for RoutingEngine {
    fn drop(&mut self) {
        self.shutdown.trigger();
        let handle = self
            .prober
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.abort();
        }
    }
}
