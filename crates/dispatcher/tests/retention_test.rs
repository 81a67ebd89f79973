use std::sync::Arc;
use std::time::Duration;

use fanout_core::{RemovalReason, RetentionConfig};
use fanout_dispatcher::RetentionSweeper;
use fanout_domain::ClusterOperation;
use fanout_testing_utils::{hosts, EngineBuilder, ManualTransport, TestEnv};
use serde_json::json;

fn retention(ttl_seconds: u64) -> RetentionConfig {
    RetentionConfig {
        enabled: true,
        completed_job_ttl_seconds: ttl_seconds,
        sweep_interval_seconds: 1,
    }
}

#[tokio::test]
async fn test_sweep_expires_only_finished_jobs() {
    let transport = ManualTransport::new();
    let (registry, engine) = EngineBuilder::new().build(Arc::new(transport.clone()));

    let finished = engine
        .multiplex_request(ClusterOperation::MountFs, hosts(&["a"]), json!({}), None)
        .await
        .unwrap();
    let running = engine
        .multiplex_request(ClusterOperation::MountFs, hosts(&["b"]), json!({}), None)
        .await
        .unwrap();
    assert!(transport.wait_for_calls(2, Duration::from_secs(5)).await);
    transport.respond(&finished, 0, 0, None).await.unwrap();

    let sweeper = RetentionSweeper::new(Arc::clone(&registry), retention(0));
    let stats = sweeper.sweep_once().await.unwrap();

    assert_eq!(stats.scanned, 2);
    assert_eq!(stats.expired, 1);
    assert!(!registry.contains(&finished).await);
    assert!(registry.contains(&running).await);
    assert_eq!(
        registry.was_recently_removed(&finished).await,
        Some(RemovalReason::Expired)
    );
}

#[tokio::test]
async fn test_sweep_keeps_jobs_within_ttl() {
    let transport = ManualTransport::new();
    let (registry, engine) = EngineBuilder::new().build(Arc::new(transport));

    let job_id = engine
        .multiplex_request(ClusterOperation::GrowFs, hosts(&[]), json!({}), None)
        .await
        .unwrap();

    let sweeper = RetentionSweeper::new(Arc::clone(&registry), retention(3600));
    let stats = sweeper.sweep_once().await.unwrap();

    assert_eq!(stats.expired, 0);
    assert_eq!(stats.retained, 1);
    assert!(registry.contains(&job_id).await);
}

#[tokio::test]
async fn test_out_of_range_ttl_never_expires() {
    let transport = ManualTransport::new();
    let (registry, engine) = EngineBuilder::new().build(Arc::new(transport));

    let job_id = engine
        .multiplex_request(ClusterOperation::GrowFs, hosts(&[]), json!({}), None)
        .await
        .unwrap();

    for ttl_seconds in [u64::MAX, 10_000_000_000_000_000] {
        let sweeper = RetentionSweeper::new(Arc::clone(&registry), retention(ttl_seconds));
        let stats = sweeper.sweep_once().await.unwrap();
        assert_eq!(stats.expired, 0);
        assert!(registry.contains(&job_id).await);
    }
}

#[tokio::test]
async fn test_background_sweeper_runs_until_stopped() {
    let transport = ManualTransport::new();
    let (registry, engine) = EngineBuilder::new().build(Arc::new(transport));

    let job_id = engine
        .multiplex_request(ClusterOperation::RemoveFs, hosts(&[]), json!({}), None)
        .await
        .unwrap();

    let mut sweeper = RetentionSweeper::new(Arc::clone(&registry), retention(0));
    sweeper.start().await.unwrap();
    assert!(sweeper.is_running());

    let registry_for_wait = Arc::clone(&registry);
    let expired = TestEnv::wait_for(
        || {
            let registry = Arc::clone(&registry_for_wait);
            let job_id = job_id.clone();
            async move { !registry.contains(&job_id).await }
        },
        Duration::from_secs(5),
    )
    .await;
    assert!(expired);

    sweeper.stop().await.unwrap();
    assert!(!sweeper.is_running());
}

#[tokio::test]
async fn test_disabled_sweeper_does_not_start() {
    let registry = Arc::new(fanout_core::ActivityRegistry::default());
    let mut sweeper = RetentionSweeper::new(registry, RetentionConfig::default());

    sweeper.start().await.unwrap();
    assert!(!sweeper.is_running());
    sweeper.stop().await.unwrap();
}
