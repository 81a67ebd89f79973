use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use fanout_core::ActivityRegistry;
use fanout_dispatcher::{HostCall, HostCallbacks, HostTransport};
use fanout_domain::JobId;
use fanout_errors::{FanoutResult, HOST_CALL_CANCELED, HOST_CALL_TIMED_OUT, TRANSPORT_ERROR};
use tokio::sync::Mutex;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use crate::executors::{HostExecutor, HostOutcome};

type InFlight = Arc<Mutex<HashMap<JobId, HashMap<usize, AbortHandle>>>>;

/// 在本进程内用 tokio 任务执行每个主机调用的传输层
///
/// 每个调用分成两个任务：可被中止的执行任务，以及负责回报结果的监视任务。
/// 取消只中止执行任务，监视任务随后以 `HOST_CALL_CANCELED` 回报。
pub struct LocalTransport {
    executor: Arc<dyn HostExecutor>,
    registry: Option<Arc<ActivityRegistry>>,
    call_timeout: Option<Duration>,
    in_flight: InFlight,
}

impl LocalTransport {
    pub fn new(executor: Arc<dyn HostExecutor>) -> Self {
        Self {
            executor,
            registry: None,
            call_timeout: None,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// 超时为零表示不限时
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = (!timeout.is_zero()).then_some(timeout);
        self
    }

    /// 在注册表中记录承载调用的进程
    pub fn with_registry(mut self, registry: Arc<ActivityRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub async fn in_flight_count(&self, job_id: &JobId) -> usize {
        self.in_flight
            .lock()
            .await
            .get(job_id)
            .map_or(0, HashMap::len)
    }

    /// 中止所有作业的全部未完成调用
    pub async fn cancel_all(&self) -> usize {
        let drained: Vec<_> = self.in_flight.lock().await.drain().collect();
        let mut aborted = 0;
        for (_, calls) in drained {
            for handle in calls.into_values() {
                handle.abort();
                aborted += 1;
            }
        }
        if aborted > 0 {
            info!("已中止 {} 个未完成的主机调用", aborted);
        }
        aborted
    }

    async fn run_call(
        executor: Arc<dyn HostExecutor>,
        callbacks: Arc<dyn HostCallbacks>,
        call: HostCall,
        call_timeout: Option<Duration>,
    ) -> Option<HostOutcome> {
        if let Err(e) = callbacks
            .calling_host(&call.job_id, &call.host, call.host_index)
            .await
        {
            debug!(job_id = %call.job_id, host = %call.host, "作业已不存在，放弃调用: {}", e);
            return None;
        }

        let execution = executor.execute(&call);
        let outcome = match call_timeout {
            Some(limit) => match tokio::time::timeout(limit, execution).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    warn!(
                        job_id = %call.job_id,
                        host = %call.host,
                        "主机调用超时（{}秒）",
                        limit.as_secs()
                    );
                    return Some(HostOutcome::failed(
                        HOST_CALL_TIMED_OUT,
                        format!("{} 在 {:?} 内未完成", call.host, limit),
                    ));
                }
            },
            None => execution.await,
        };

        Some(outcome.unwrap_or_else(|e| HostOutcome::failed(e.code(), e.to_string())))
    }
}

#[async_trait]
impl HostTransport for LocalTransport {
    async fn send_request(
        &self,
        call: HostCall,
        callbacks: Arc<dyn HostCallbacks>,
    ) -> FanoutResult<()> {
        if let Some(registry) = &self.registry {
            if let Err(e) = registry
                .set_pid_or_tid(&call.job_id, Some(std::process::id()), None)
                .await
            {
                debug!(job_id = %call.job_id, "记录进程号失败: {}", e);
            }
        }

        let job_id = call.job_id.clone();
        let host = call.host.clone();
        let host_index = call.host_index;

        let mut in_flight = self.in_flight.lock().await;
        let execution = tokio::spawn(Self::run_call(
            Arc::clone(&self.executor),
            Arc::clone(&callbacks),
            call,
            self.call_timeout,
        ));
        in_flight
            .entry(job_id.clone())
            .or_default()
            .insert(host_index, execution.abort_handle());
        drop(in_flight);

        let in_flight = Arc::clone(&self.in_flight);
        tokio::spawn(async move {
            let outcome = match execution.await {
                Ok(Some(outcome)) => Some(outcome),
                Ok(None) => None,
                Err(e) if e.is_cancelled() => {
                    Some(HostOutcome::failed(HOST_CALL_CANCELED, "主机调用已取消"))
                }
                Err(e) => Some(HostOutcome::failed(
                    TRANSPORT_ERROR,
                    format!("主机调用异常终止: {e}"),
                )),
            };

            {
                let mut in_flight = in_flight.lock().await;
                if let Some(calls) = in_flight.get_mut(&job_id) {
                    calls.remove(&host_index);
                    if calls.is_empty() {
                        in_flight.remove(&job_id);
                    }
                }
            }

            let Some(outcome) = outcome else {
                return;
            };
            if let Err(e) = callbacks
                .host_responded(&job_id, &host, host_index, outcome.error_number, outcome.result)
                .await
            {
                debug!(job_id = %job_id, host = %host, host_index, "回报主机结果失败: {}", e);
            }
        });

        Ok(())
    }

    async fn cancel(&self, job_id: &JobId) -> FanoutResult<()> {
        let calls = self.in_flight.lock().await.remove(job_id);
        let Some(calls) = calls else {
            debug!(job_id = %job_id, "作业没有未完成的主机调用");
            return Ok(());
        };
        let count = calls.len();
        for handle in calls.into_values() {
            handle.abort();
        }
        info!(job_id = %job_id, "已中止作业 {} 的 {} 个主机调用", job_id, count);
        Ok(())
    }
}
