use std::sync::Arc;
use std::time::Duration;

use fanout_core::KillOutcome;
use fanout_dispatcher::{DispatchController, DispatchEngine};
use fanout_domain::{ClusterOperation, JobId, OverallStatus};
use fanout_errors::FanoutError;
use fanout_testing_utils::{hosts, EngineBuilder, ManualTransport};
use serde_json::json;

const WAIT: Duration = Duration::from_secs(5);

fn setup() -> (ManualTransport, Arc<DispatchEngine>, DispatchController) {
    let transport = ManualTransport::new();
    let (_, engine) = EngineBuilder::new().build(Arc::new(transport.clone()));
    let engine = Arc::new(engine);
    let controller = DispatchController::new(Arc::clone(&engine), 10);
    (transport, engine, controller)
}

async fn start(
    engine: &DispatchEngine,
    transport: &ManualTransport,
    op: ClusterOperation,
    names: &[&str],
) -> JobId {
    let before = transport.call_count();
    let job_id = engine
        .multiplex_request(op, hosts(names), json!({}), None)
        .await
        .unwrap();
    assert!(transport.wait_for_calls(before + names.len(), WAIT).await);
    job_id
}

#[tokio::test]
async fn test_list_jobs_filters_by_pattern_and_limit() {
    let (transport, engine, controller) = setup();
    let mount = start(&engine, &transport, ClusterOperation::MountFs, &["a"]).await;
    start(&engine, &transport, ClusterOperation::GrowFs, &["a"]).await;
    start(&engine, &transport, ClusterOperation::MountFs, &["b"]).await;

    let all = controller.list_jobs(None, None).await.unwrap();
    assert_eq!(all.len(), 3);

    let mounts = controller
        .list_jobs(None, Some("*func=mount_fs*"))
        .await
        .unwrap();
    assert_eq!(mounts.len(), 2);
    assert!(mounts[0].contains(&format!("activityid={mount} ")));

    let capped = controller.list_jobs(Some(1), None).await.unwrap();
    assert_eq!(capped.len(), 1);

    let none = controller.list_jobs(Some(0), None).await.unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn test_list_jobs_rejects_bad_pattern() {
    let (_, _, controller) = setup();
    let err = controller.list_jobs(None, Some("[unclosed")).await.unwrap_err();
    assert!(matches!(err, FanoutError::InvalidPattern { .. }));
}

#[tokio::test]
async fn test_summary_and_failed_hosts() {
    let (transport, engine, controller) = setup();
    let job_id = start(&engine, &transport, ClusterOperation::UnmountFs, &["a", "b", "c", "d"]).await;

    transport.start(&job_id, 0).await.unwrap();
    transport.start(&job_id, 1).await.unwrap();
    transport.respond(&job_id, 1, 16, Some("EBUSY")).await.unwrap();
    transport.respond(&job_id, 2, 0, None).await.unwrap();

    let summary = controller.summary(&job_id).await.unwrap();
    assert_eq!(summary.not_yet_called, 1);
    assert_eq!(summary.pending, 1);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.total(), 4);

    let failed = controller.failed_hosts(&job_id).await.unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].host_index, 1);
    assert_eq!(failed[0].host, "b");
    assert_eq!(failed[0].error, 16);
    assert_eq!(failed[0].result.as_deref(), Some("EBUSY"));
}

#[tokio::test]
async fn test_cancel_job_removes_it() {
    let (transport, engine, controller) = setup();
    let job_id = start(&engine, &transport, ClusterOperation::MountFs, &["a"]).await;

    assert_eq!(controller.cancel_job(&job_id).await.unwrap(), KillOutcome::Killed);
    assert!(matches!(
        controller.job_status(&job_id).await,
        Err(FanoutError::NoSuchActivity { .. })
    ));
    assert!(controller.cancel_job(&job_id).await.is_err());
}

#[tokio::test]
async fn test_purge_only_finished_jobs() {
    let (transport, engine, controller) = setup();
    let job_id = start(&engine, &transport, ClusterOperation::MountFs, &["a"]).await;

    assert!(!controller.purge_job(&job_id).await.unwrap());
    assert!(controller.job_status(&job_id).await.is_ok());

    transport.respond(&job_id, 0, 0, None).await.unwrap();
    let snapshot = controller.job_status(&job_id).await.unwrap();
    assert_eq!(snapshot.overall_status, OverallStatus::Done);

    assert!(controller.purge_job(&job_id).await.unwrap());
    assert!(controller.job_status(&job_id).await.is_err());
    assert!(transport.canceled().is_empty());
}

#[tokio::test]
async fn test_job_status_serializes_per_host_table() {
    let (transport, engine, controller) = setup();
    let job_id = start(&engine, &transport, ClusterOperation::GrowFs, &["a", "b"]).await;
    transport.respond(&job_id, 0, 0, Some("grown")).await.unwrap();

    let snapshot = controller.job_status(&job_id).await.unwrap();
    let value = serde_json::to_value(&snapshot).unwrap();
    assert_eq!(value["func_id"], "grow_fs");
    assert_eq!(value["overall_status"], "PENDING");
    assert_eq!(value["responses"][0]["status"], "SUCCEEDED");
    assert_eq!(value["responses"][1]["status"], "NOT_YET_CALLED");
}
