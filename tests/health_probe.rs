//! Health prober running inside the engine.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use backend_router::config::{BackendConfig, RouterConfig};
use backend_router::dispatch::RoutingEngine;
use backend_router::health::HealthState;
use backend_router::routing::{get_candidates, TaskRequirement};

mod common;
use common::{call, MockFactory};

fn probing_engine(backends: Vec<BackendConfig>) -> (RoutingEngine, Arc<MockFactory>) {
    let mut config = RouterConfig::default();
    config.health_check.interval_secs = 1;
    config.health_check.unhealthy_threshold = 1;
    config.backends = backends;
    let factory = Arc::new(MockFactory::default());
    let engine = RoutingEngine::new(config, factory.clone()).unwrap();
    (engine, factory)
}

#[tokio::test(start_paused = true)]
async fn test_failed_probe_excludes_until_recovery() {
    let factory_backends = vec![
        BackendConfig::new("a", ["x"]).with_priority(1),
        BackendConfig::new("b", ["x"]).with_priority(2),
    ];
    let (engine, factory) = probing_engine(factory_backends);
    factory.backend("a").set_probe_ok(false);

    // First tick fires immediately.
    tokio::time::sleep(Duration::from_millis(10)).await;
    let health = &engine.get_health(Some("a"))[0];
    assert!(!health.is_healthy);
    assert_eq!(health.state, HealthState::Unhealthy);
    assert_eq!(health.consecutive_failures, 1);
    assert_eq!(health.recent_issues, vec!["connection failed: a is down"]);

    let req = TaskRequirement::new(["x"]);
    let outcome = engine.execute_task("t1", "test", call, &req).await.unwrap();
    assert_eq!(outcome.backend_id, "b");
    assert_eq!(factory.backend("a").invocations(), 0);

    factory.backend("a").set_probe_ok(true);
    tokio::time::sleep(Duration::from_secs(1)).await;

    let health = &engine.get_health(Some("a"))[0];
    assert!(health.is_healthy);
    assert!(health.recent_issues.is_empty());
    assert!(health.last_probe_latency_ms.is_some());

    let ids: Vec<_> = get_candidates(engine.registry(), &req, Instant::now(), Duration::from_secs(60))
        .iter()
        .map(|c| c.id().to_string())
        .collect();
    assert_eq!(ids, vec!["a", "b"]);

    // With matching history the lower priority value wins again.
    engine
        .record_completion("a", true, 0.0, 1, Duration::from_millis(5))
        .unwrap();
    let outcome = engine.execute_task("t2", "test", call, &req).await.unwrap();
    assert_eq!(outcome.backend_id, "a");

    engine.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_probing() {
    let (engine, factory) = probing_engine(vec![BackendConfig::new("a", ["x"])]);
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(engine.get_health(None)[0].state, HealthState::Healthy);

    engine.shutdown().await;
    let probes = factory.backend("a").probes.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(factory.backend("a").probes.load(Ordering::SeqCst), probes);
}

#[tokio::test(start_paused = true)]
async fn test_registered_later_is_probed_next_tick() {
    let (engine, factory) = probing_engine(vec![]);
    engine
        .register_backend(BackendConfig::new("late", ["x"]))
        .unwrap();
    factory.backend("late").set_probe_ok(false);
    assert!(engine.get_health(Some("late"))[0].is_healthy);

    tokio::time::sleep(Duration::from_millis(1010)).await;
    assert!(!engine.get_health(Some("late"))[0].is_healthy);

    engine.shutdown().await;
}

#[test]
fn test_prober_requires_runtime() {
    let config = RouterConfig::default();
    let result = RoutingEngine::new(config, Arc::new(MockFactory::default()));
    assert!(result.is_err());
}
