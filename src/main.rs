//! backend-router
//!
//! Runs the routing engine against HTTP backends described in a TOML file.
//!
//! # Commands
//! - `run`: engine + health prober + config hot reload until SIGINT/SIGTERM
//! - `check`: validate the config and print the backends it declares
//! - `dispatch`: route one task and print the outcome as JSON

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde_json::Value;

use backend_router::backend::{BackendError, BackendRequest, HttpBackendFactory};
use backend_router::config::{load_config, ConfigWatcher, RouterConfig};
use backend_router::dispatch::{Completion, RoutingEngine};
use backend_router::lifecycle::wait_for_termination;
use backend_router::observability::{logging, metrics};
use backend_router::routing::{ComplexityTier, TaskRequirement};

#[derive(Parser)]
#[command(name = "backend-router")]
#[command(about = "Capability-aware backend routing with single-hop fallback", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "router.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the engine until interrupted
    Run {
        /// Seconds between overview log lines
        #[arg(long, default_value_t = 60)]
        overview_secs: u64,
    },
    /// Validate the configuration and list its backends
    Check,
    /// Route a single task and print the outcome
    Dispatch {
        /// Required capability tag (repeatable)
        #[arg(short = 'C', long = "capability", required = true)]
        capabilities: Vec<String>,

        #[arg(long, default_value = "generic")]
        task_type: String,

        /// JSON payload sent to the backend
        #[arg(long, default_value = "{}")]
        payload: String,

        #[arg(long, default_value = "low")]
        complexity: ComplexityTier,

        #[arg(long)]
        max_latency_ms: Option<u64>,

        #[arg(long)]
        max_cost: Option<f64>,

        #[arg(long)]
        min_quality: Option<f64>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Run { overview_secs } => run(cli.config, config, overview_secs).await,
        Commands::Check => {
            check(&config);
            Ok(())
        }
        Commands::Dispatch {
            capabilities,
            task_type,
            payload,
            complexity,
            max_latency_ms,
            max_cost,
            min_quality,
        } => {
            let mut requirement = TaskRequirement::new(capabilities).with_complexity(complexity);
            requirement.max_latency = max_latency_ms.map(Duration::from_millis);
            requirement.max_cost = max_cost;
            requirement.min_quality = min_quality;
            let payload: Value = serde_json::from_str(&payload)?;
            dispatch(config, requirement, task_type, payload).await
        }
    }
}

async fn run(
    path: PathBuf,
    config: RouterConfig,
    overview_secs: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    logging::init_logging(&config.observability).map_err(|e| -> Box<dyn std::error::Error> { e })?;
    tracing::info!("backend-router v{} starting", env!("CARGO_PKG_VERSION"));

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let engine = RoutingEngine::new(config, Arc::new(HttpBackendFactory::new()))?;

    let (watcher, mut updates) = ConfigWatcher::new(&path);
    let _watcher = watcher.run()?;

    let mut overview = tokio::time::interval(Duration::from_secs(overview_secs.max(1)));
    let terminate = wait_for_termination();
    tokio::pin!(terminate);

    loop {
        tokio::select! {
            Some(next) = updates.recv() => {
                if let Err(e) = engine.apply_config(next) {
                    tracing::error!(error = %e, "Reloaded configuration rejected");
                }
            }
            _ = overview.tick() => {
                let o = engine.get_overview();
                tracing::info!(
                    total_backends = o.total_backends,
                    healthy_backends = o.healthy_backends,
                    requests_last_hour = o.requests_last_hour,
                    cost_last_hour = o.cost_last_hour,
                    avg_response_time_ms = o.avg_response_time_ms,
                    health_score = o.health_score,
                    "Overview"
                );
            }
            signal = &mut terminate => {
                match signal {
                    Ok(signal) => tracing::info!(%signal, "Termination signal received"),
                    Err(e) => tracing::error!(error = %e, "Signal handler failed, shutting down"),
                }
                break;
            }
        }
    }

    engine.shutdown().await;
    tracing::info!("Shutdown complete");
    Ok(())
}

fn check(config: &RouterConfig) {
    println!("configuration OK: {} backend(s)", config.backends.len());
    for backend in &config.backends {
        let caps: Vec<&str> = backend.capabilities.iter().map(String::as_str).collect();
        println!(
            "  {:<20} priority={:<4} cost/unit={:<8} max_per_min={:<6} fallback={} caps=[{}] endpoint={}",
            backend.id,
            backend.priority,
            backend.cost_per_unit,
            backend.max_throughput_per_minute,
            backend.fallback_eligible,
            caps.join(", "),
            backend.endpoint.as_deref().unwrap_or("-"),
        );
    }
}

async fn dispatch(
    mut config: RouterConfig,
    requirement: TaskRequirement,
    task_type: String,
    payload: Value,
) -> Result<(), Box<dyn std::error::Error>> {
    // One-shot: no background probing.
    config.health_check.enabled = false;
    if let Err(e) = logging::init_logging(&config.observability) {
        eprintln!("logging disabled: {e}");
    }

    let engine = RoutingEngine::new(config, Arc::new(HttpBackendFactory::new()))?;
    let task_id = uuid::Uuid::new_v4().to_string();
    let request = BackendRequest {
        task_id: task_id.clone(),
        task_type: task_type.clone(),
        payload,
    };

    let outcome = engine
        .execute_task(
            &task_id,
            &task_type,
            |handle| {
                let request = request.clone();
                async move {
                    let response = handle.invoke(request).await?;
                    Ok::<_, BackendError>(match response.units_used {
                        Some(units) => Completion::with_units(response.body, units),
                        None => Completion::new(response.body),
                    })
                }
            },
            &requirement,
        )
        .await?;

    println!("{}", serde_json::to_string_pretty(&outcome)?);
    engine.shutdown().await;
    Ok(())
}
