#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use fanout_core::{ExecutorKind, WorkerConfig};
    use fanout_dispatcher::{HostCall, HostCallbacks, HostTransport};
    use fanout_domain::{ClusterOperation, JobId};
    use fanout_errors::{FanoutError, FanoutResult, HOST_CALL_CANCELED, HOST_CALL_TIMED_OUT};
    use serde_json::json;
    use tokio::sync::{Mutex, Notify};

    use crate::executors::{
        CommandExecutor, DryRunExecutor, HostExecutor, HostOutcome, MockHostExecutor,
    };
    use crate::{build_executor, LocalTransport};

    fn call(host: &str, host_index: usize, args: serde_json::Value) -> HostCall {
        HostCall {
            func_id: ClusterOperation::MountFs,
            job_id: JobId::from("7"),
            host: host.to_string(),
            host_index,
            args: Arc::new(args),
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    enum Event {
        Calling(usize),
        Responded(usize, i32, Option<String>),
    }

    #[derive(Default)]
    struct RecordingCallbacks {
        events: Mutex<Vec<Event>>,
        responded: Notify,
        reject_calls: bool,
    }

    impl RecordingCallbacks {
        async fn wait_for_responses(&self, count: usize) -> Vec<Event> {
            tokio::time::timeout(Duration::from_secs(5), async {
                loop {
                    let notified = self.responded.notified();
                    let events = self.events.lock().await.clone();
                    let responses = events
                        .iter()
                        .filter(|e| matches!(e, Event::Responded(..)))
                        .count();
                    if responses >= count {
                        return events;
                    }
                    notified.await;
                }
            })
            .await
            .expect("responses did not arrive")
        }
    }

    #[async_trait]
    impl HostCallbacks for RecordingCallbacks {
        async fn calling_host(&self, job_id: &JobId, _host: &str, host_index: usize) -> FanoutResult<()> {
            if self.reject_calls {
                return Err(FanoutError::no_such_activity(job_id.as_str()));
            }
            self.events.lock().await.push(Event::Calling(host_index));
            Ok(())
        }

        async fn host_responded(
            &self,
            _job_id: &JobId,
            _host: &str,
            host_index: usize,
            error_number: i32,
            result: Option<String>,
        ) -> FanoutResult<()> {
            self.events
                .lock()
                .await
                .push(Event::Responded(host_index, error_number, result));
            self.responded.notify_waiters();
            Ok(())
        }
    }

    struct SlowExecutor(Duration);

    #[async_trait]
    impl HostExecutor for SlowExecutor {
        async fn execute(&self, _call: &HostCall) -> FanoutResult<HostOutcome> {
            tokio::time::sleep(self.0).await;
            Ok(HostOutcome::succeeded("slow"))
        }

        fn name(&self) -> &'static str {
            "slow"
        }
    }

    #[tokio::test]
    async fn test_dry_run_fails_only_listed_hosts() {
        let executor = DryRunExecutor::new(Duration::ZERO);
        let args = json!({"fail_hosts": ["b"], "fail_error": 5});

        let ok = executor.execute(&call("a", 0, args.clone())).await.unwrap();
        assert_eq!(ok.error_number, 0);
        assert_eq!(ok.result.as_deref(), Some("dry-run mount_fs on a"));

        let failed = executor.execute(&call("b", 1, args)).await.unwrap();
        assert_eq!(failed.error_number, 5);
    }

    #[tokio::test]
    async fn test_dry_run_ignores_unrelated_args() {
        let executor = DryRunExecutor::new(Duration::ZERO);
        let outcome = executor
            .execute(&call("a", 0, json!({"fail_hosts": ["a"]})))
            .await
            .unwrap();
        assert_eq!(outcome.error_number, 1);

        let outcome = executor
            .execute(&call("a", 0, json!("opaque payload")))
            .await
            .unwrap();
        assert_eq!(outcome.error_number, 0);
    }

    #[tokio::test]
    async fn test_dry_run_malformed_failure_args_fall_back_to_success() {
        let executor = DryRunExecutor::new(Duration::ZERO);
        let outcome = executor
            .execute(&call("a", 0, json!({"fail_hosts": "a", "fail_error": "bad"})))
            .await
            .unwrap();
        assert_eq!(outcome.error_number, 0);
    }

    #[test]
    fn test_command_args_are_templated() {
        let executor = CommandExecutor::new(
            "mount-helper",
            vec![
                "--host={host}".to_string(),
                "{op}".to_string(),
                "{job_id}".to_string(),
                "{args}".to_string(),
            ],
        );
        let rendered = executor.render_args(&call("nodeA", 0, json!({"fs": "qfs1"})));
        assert_eq!(
            rendered,
            vec!["--host=nodeA", "mount_fs", "7", r#"{"fs":"qfs1"}"#]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_executor_maps_exit_code() {
        let ok = CommandExecutor::new("sh", vec!["-c".to_string(), "echo mounted {host}".to_string()]);
        let outcome = ok.execute(&call("a", 0, json!({}))).await.unwrap();
        assert_eq!(outcome, HostOutcome::succeeded("mounted a"));

        let failing = CommandExecutor::new(
            "sh",
            vec!["-c".to_string(), "echo busy >&2; exit 16".to_string()],
        );
        let outcome = failing.execute(&call("a", 0, json!({}))).await.unwrap();
        assert_eq!(outcome, HostOutcome::failed(16, "busy"));
    }

    #[tokio::test]
    async fn test_command_executor_missing_program() {
        let executor = CommandExecutor::new("/nonexistent/fanout-helper", Vec::new());
        let err = executor.execute(&call("a", 0, json!({}))).await.unwrap_err();
        assert!(matches!(err, FanoutError::Transport(_)));
    }

    #[test]
    fn test_build_executor_from_config() {
        let dry_run = build_executor(&WorkerConfig::default()).unwrap();
        assert_eq!(dry_run.name(), "dry_run");

        let config = WorkerConfig {
            executor: ExecutorKind::Command,
            command_program: None,
            ..WorkerConfig::default()
        };
        assert!(matches!(
            build_executor(&config),
            Err(FanoutError::Configuration(_))
        ));

        let config = WorkerConfig {
            executor: ExecutorKind::Command,
            command_program: Some("/usr/bin/true".to_string()),
            ..WorkerConfig::default()
        };
        assert_eq!(build_executor(&config).unwrap().name(), "command");
    }

    #[tokio::test]
    async fn test_local_transport_reports_call_then_response() {
        let mut executor = MockHostExecutor::new();
        executor
            .expect_execute()
            .times(1)
            .returning(|call| Ok(HostOutcome::succeeded(format!("done {}", call.host))));
        let transport = LocalTransport::new(Arc::new(executor));
        let callbacks = Arc::new(RecordingCallbacks::default());

        transport
            .send_request(call("a", 3, json!({})), callbacks.clone())
            .await
            .unwrap();

        let events = callbacks.wait_for_responses(1).await;
        assert_eq!(
            events,
            vec![
                Event::Calling(3),
                Event::Responded(3, 0, Some("done a".to_string()))
            ]
        );
    }

    #[tokio::test]
    async fn test_local_transport_maps_executor_error() {
        let mut executor = MockHostExecutor::new();
        executor
            .expect_execute()
            .returning(|_| Err(FanoutError::transport("connection refused")));
        let transport = LocalTransport::new(Arc::new(executor));
        let callbacks = Arc::new(RecordingCallbacks::default());

        transport
            .send_request(call("a", 0, json!({})), callbacks.clone())
            .await
            .unwrap();

        let events = callbacks.wait_for_responses(1).await;
        let expected = FanoutError::transport("connection refused");
        assert!(matches!(
            &events[1],
            Event::Responded(0, code, Some(_)) if *code == expected.code()
        ));
    }

    #[tokio::test]
    async fn test_local_transport_skips_execution_for_missing_job() {
        let mut executor = MockHostExecutor::new();
        executor.expect_execute().times(0);
        let transport = LocalTransport::new(Arc::new(executor));
        let callbacks = Arc::new(RecordingCallbacks {
            reject_calls: true,
            ..RecordingCallbacks::default()
        });

        transport
            .send_request(call("a", 0, json!({})), callbacks.clone())
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(callbacks.events.lock().await.is_empty());
        assert_eq!(transport.in_flight_count(&JobId::from("7")).await, 0);
    }

    #[tokio::test]
    async fn test_local_transport_times_out_slow_host() {
        let transport = LocalTransport::new(Arc::new(SlowExecutor(Duration::from_secs(30))))
            .with_call_timeout(Duration::from_millis(20));
        let callbacks = Arc::new(RecordingCallbacks::default());

        transport
            .send_request(call("a", 0, json!({})), callbacks.clone())
            .await
            .unwrap();

        let events = callbacks.wait_for_responses(1).await;
        assert!(matches!(
            events[1],
            Event::Responded(0, HOST_CALL_TIMED_OUT, Some(_))
        ));
    }

    #[tokio::test]
    async fn test_local_transport_cancel_reports_canceled() {
        let transport = LocalTransport::new(Arc::new(SlowExecutor(Duration::from_secs(30))));
        let callbacks = Arc::new(RecordingCallbacks::default());
        let job_id = JobId::from("7");

        transport
            .send_request(call("a", 0, json!({})), callbacks.clone())
            .await
            .unwrap();
        transport
            .send_request(call("b", 1, json!({})), callbacks.clone())
            .await
            .unwrap();
        assert_eq!(transport.in_flight_count(&job_id).await, 2);

        transport.cancel(&job_id).await.unwrap();

        let events = callbacks.wait_for_responses(2).await;
        let canceled = events
            .iter()
            .filter(|e| matches!(e, Event::Responded(_, HOST_CALL_CANCELED, _)))
            .count();
        assert_eq!(canceled, 2);
        assert_eq!(transport.in_flight_count(&job_id).await, 0);
        assert!(transport.cancel(&job_id).await.is_ok());
    }
}
