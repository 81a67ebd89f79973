use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use fanout_core::{ActivityRegistry, DispatcherConfig, KillOutcome};
use fanout_domain::{
    normalize_host_list, ActivityType, ClusterOperation, DispatchJobSnapshot, HostList,
    HostStatus, JobId, NormalizedHosts, OverallStatus,
};
use fanout_errors::{FanoutError, FanoutResult, TRANSPORT_ERROR};
use metrics::counter;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tracing::{debug, error, info, instrument, warn};

use crate::job::{DispatchJob, JobState};
use crate::post_phase::PostPhase;
use crate::transport::{HostCall, HostCallbacks, HostTransport};

/// 收尾步骤中需要在锁外执行的后置阶段
struct PendingPostPhase {
    post_phase: Arc<dyn PostPhase>,
    snapshot: DispatchJobSnapshot,
}

/// 多主机扇出/扇入引擎
///
/// 每个分发作业同时是注册表中的一个活动。注册表锁只管成员关系，作业字段由
/// 作业自己的锁保护；调用方提供的后置阶段在任何锁之外运行。
#[derive(Clone)]
pub struct DispatchEngine {
    registry: Arc<ActivityRegistry>,
    transport: Arc<dyn HostTransport>,
    call_slots: Arc<Semaphore>,
    local_host: String,
}

impl DispatchEngine {
    pub fn new(
        registry: Arc<ActivityRegistry>,
        transport: Arc<dyn HostTransport>,
        config: &DispatcherConfig,
    ) -> Self {
        Self {
            registry,
            transport,
            call_slots: Arc::new(Semaphore::new(config.max_concurrent_calls.max(1))),
            local_host: config.resolve_local_hostname(),
        }
    }

    pub fn registry(&self) -> &Arc<ActivityRegistry> {
        &self.registry
    }

    pub fn local_host(&self) -> &str {
        &self.local_host
    }

    /// 按本机主机名规范化原始主机列表
    pub fn normalize_targets<I, S>(&self, raw_hosts: I) -> NormalizedHosts
    where
        I: IntoIterator<Item = Option<S>>,
        S: AsRef<str>,
    {
        normalize_host_list(raw_hosts, &self.local_host)
    }

    /// 创建分发作业并向每个主机异步发起调用，立即返回作业ID
    ///
    /// 作业在发出任何主机调用之前已登记到注册表。零主机作业当场完成收尾。
    #[instrument(skip(self, hosts, args, post_phase), fields(func_id = %func_id, host_count = hosts.len()))]
    pub async fn multiplex_request(
        &self,
        func_id: ClusterOperation,
        hosts: HostList,
        args: serde_json::Value,
        post_phase: Option<Arc<dyn PostPhase>>,
    ) -> FanoutResult<JobId> {
        let job = Arc::new(DispatchJob::new(
            func_id,
            hosts,
            args,
            post_phase,
            Arc::clone(&self.transport),
        ));
        let job_id = self
            .registry
            .start_activity(ActivityType::Dispatch, job.clone())
            .await?;

        counter!("fanout_jobs_started_total", "op" => func_id.as_str()).increment(1);
        info!(
            job_id = %job_id,
            "已创建分发作业 {}，目标主机 {} 个",
            job_id,
            job.host_count()
        );

        if job.host_count() == 0 {
            let pending = {
                let mut state = job.lock_state().await;
                self.begin_finalization(&job_id, &job, &mut state)
            };
            self.complete_finalization(&job_id, &job, pending).await;
            return Ok(job_id);
        }

        for (host_index, host) in job.hosts().iter().enumerate() {
            let call = HostCall {
                func_id,
                job_id: job_id.clone(),
                host: host.clone(),
                host_index,
                args: Arc::clone(job.args()),
            };
            let engine = self.clone();
            tokio::spawn(async move {
                engine.issue_call(call).await;
            });
        }

        Ok(job_id)
    }

    async fn issue_call(self, call: HostCall) {
        let permit = match Arc::clone(&self.call_slots).acquire_owned().await {
            Ok(permit) => permit,
            Err(e) => {
                error!(job_id = %call.job_id, host = %call.host, "获取调用配额失败: {}", e);
                return;
            }
        };

        let job_id = call.job_id.clone();
        let host = call.host.clone();
        let host_index = call.host_index;
        let callbacks: Arc<dyn HostCallbacks> = Arc::new(CallSlotCallbacks {
            engine: self.clone(),
            permit: Mutex::new(Some(permit)),
        });

        if let Err(e) = self.transport.send_request(call, callbacks).await {
            warn!(
                job_id = %job_id,
                host = %host,
                host_index,
                "向主机发送请求失败: {}",
                e
            );
            if let Err(err) = self
                .host_responded(&job_id, &host, host_index, TRANSPORT_ERROR, Some(e.to_string()))
                .await
            {
                debug!(job_id = %job_id, host = %host, "无法记录传输失败: {}", err);
            }
        }
    }

    /// 某个主机的调用实际发出时调用；不会回退已经到达的响应状态
    pub async fn calling_host(&self, job_id: &JobId, host: &str, host_index: usize) -> FanoutResult<()> {
        let job = self.find_job(job_id).await?;
        let host_count = job.host_count();
        if host_index >= host_count {
            return Err(FanoutError::invalid_host_index(job_id.as_str(), host_index, host_count));
        }

        let mut state = job.lock_state().await;
        if state.hosts_called < host_count {
            state.hosts_called += 1;
        }
        let response = &mut state.responses[host_index];
        if response.status == HostStatus::NotYetCalled {
            response.status = HostStatus::Pending;
        }
        if state.overall_status == OverallStatus::Initializing {
            job.set_overall_status(&mut state, OverallStatus::Pending);
        }

        debug!(job_id = %job_id, host, host_index, "主机调用已发出");
        Ok(())
    }

    /// 记录某个主机的调用结果；最后一个响应者触发收尾
    pub async fn host_responded(
        &self,
        job_id: &JobId,
        host: &str,
        host_index: usize,
        error_number: i32,
        result: Option<String>,
    ) -> FanoutResult<()> {
        let job = self.find_job(job_id).await?;
        let host_count = job.host_count();
        if host_index >= host_count {
            warn!(job_id = %job_id, host, host_index, host_count, "响应中的主机序号越界");
            return Err(FanoutError::invalid_host_index(job_id.as_str(), host_index, host_count));
        }
        if job.hosts()[host_index] != host {
            debug!(
                job_id = %job_id,
                host_index,
                expected = %job.hosts()[host_index],
                actual = host,
                "响应主机名与序号不一致，以序号为准"
            );
        }

        let pending = {
            let mut state = job.lock_state().await;
            let response = &mut state.responses[host_index];
            if response.status.is_terminal() {
                return Err(FanoutError::HostAlreadyResponded {
                    job_id: job_id.to_string(),
                    host_index,
                });
            }
            response.status = if error_number == 0 {
                HostStatus::Succeeded
            } else {
                HostStatus::Failed
            };
            response.error = error_number;
            response.result = result;
            state.hosts_responded += 1;
            if state.overall_status == OverallStatus::Initializing {
                job.set_overall_status(&mut state, OverallStatus::Pending);
            }

            if state.hosts_responded == host_count {
                Some(self.begin_finalization(job_id, &job, &mut state))
            } else {
                None
            }
        };

        let outcome = if error_number == 0 { "succeeded" } else { "failed" };
        counter!("fanout_host_responses_total", "outcome" => outcome).increment(1);
        if error_number == 0 {
            debug!(job_id = %job_id, host, host_index, "主机调用成功");
        } else {
            info!(job_id = %job_id, host, host_index, error_number, "主机调用失败");
        }

        if let Some(pending) = pending {
            self.complete_finalization(job_id, &job, pending).await;
        }
        Ok(())
    }

    /// 在作业锁内开始收尾：无后置阶段直接进入 DONE，否则进入 POST_PHASE_PENDING
    fn begin_finalization(
        &self,
        job_id: &JobId,
        job: &DispatchJob,
        state: &mut JobState,
    ) -> Option<PendingPostPhase> {
        match job.post_phase() {
            Some(post_phase) => {
                job.set_overall_status(state, OverallStatus::PostPhasePending);
                Some(PendingPostPhase {
                    post_phase,
                    snapshot: job.snapshot_locked(job_id, state),
                })
            }
            None => {
                state.end_time = Some(Utc::now());
                job.set_overall_status(state, OverallStatus::Done);
                None
            }
        }
    }

    async fn complete_finalization(
        &self,
        job_id: &JobId,
        job: &DispatchJob,
        pending: Option<PendingPostPhase>,
    ) {
        let Some(PendingPostPhase { post_phase, snapshot }) = pending else {
            counter!("fanout_jobs_finalized_total", "status" => OverallStatus::Done.as_str())
                .increment(1);
            info!(job_id = %job_id, "分发作业 {} 已完成", job_id);
            return;
        };

        let outcome = post_phase.finalize(&snapshot).await;

        let mut state = job.lock_state().await;
        state.end_time = Some(Utc::now());
        let status = match outcome {
            Ok(()) => OverallStatus::PostPhaseSucceeded,
            Err(failure) => {
                warn!(
                    job_id = %job_id,
                    code = failure.code,
                    "后置阶段失败: {}",
                    failure.message
                );
                state.overall_error_num = Some(failure.code);
                state.overall_error_msg = Some(failure.message);
                OverallStatus::PostPhaseFailed
            }
        };
        job.set_overall_status(&mut state, status);
        drop(state);

        counter!("fanout_jobs_finalized_total", "status" => status.as_str()).increment(1);
        info!(job_id = %job_id, status = %status, "分发作业 {} 后置阶段结束", job_id);
    }

    pub async fn job_status(&self, job_id: &JobId) -> FanoutResult<DispatchJobSnapshot> {
        let job = self.find_job(job_id).await?;
        Ok(job.snapshot(job_id).await)
    }

    /// 取消作业：从注册表摘除并通知传输层停止未完成的调用
    pub async fn kill_job(&self, job_id: &JobId) -> FanoutResult<KillOutcome> {
        self.registry
            .kill_activity(job_id, ActivityType::Dispatch)
            .await
    }

    /// 移除作业的簿记，不触发取消
    pub async fn end_job(&self, job_id: &JobId) -> FanoutResult<()> {
        self.find_job(job_id).await?;
        self.registry.end_this_activity(job_id).await
    }

    /// 等待作业进入终态并返回最终快照
    pub async fn wait_for_completion(
        &self,
        job_id: &JobId,
        timeout: Duration,
    ) -> FanoutResult<DispatchJobSnapshot> {
        let job = self.find_job(job_id).await?;
        let mut status_rx = job.subscribe();
        let waited = tokio::time::timeout(timeout, async {
            status_rx
                .wait_for(|status| status.is_terminal())
                .await
                .map(|_| ())
        })
        .await;

        match waited {
            Ok(Ok(())) => Ok(job.snapshot(job_id).await),
            Ok(Err(e)) => Err(FanoutError::Internal(format!("作业状态通道已关闭: {e}"))),
            Err(_) => Err(FanoutError::Timeout(format!(
                "等待作业 {job_id} 完成超时（{}秒）",
                timeout.as_secs()
            ))),
        }
    }

    pub(crate) async fn find_job(&self, job_id: &JobId) -> FanoutResult<Arc<DispatchJob>> {
        match self.registry.get_args_as::<DispatchJob>(job_id).await {
            Ok(job) => Ok(job),
            Err(e) => {
                if let Some(reason) = self.registry.was_recently_removed(job_id).await {
                    debug!(job_id = %job_id, reason = ?reason, "作业已被移除");
                }
                Err(e)
            }
        }
    }
}

/// 单个主机调用的回调句柄，占用一个调用配额
///
/// 配额在该主机的结果记录之后归还；传输层未回报就丢弃句柄时随句柄一起归还。
struct CallSlotCallbacks {
    engine: DispatchEngine,
    permit: Mutex<Option<OwnedSemaphorePermit>>,
}

#[async_trait]
impl HostCallbacks for CallSlotCallbacks {
    async fn calling_host(&self, job_id: &JobId, host: &str, host_index: usize) -> FanoutResult<()> {
        self.engine.calling_host(job_id, host, host_index).await
    }

    async fn host_responded(
        &self,
        job_id: &JobId,
        host: &str,
        host_index: usize,
        error_number: i32,
        result: Option<String>,
    ) -> FanoutResult<()> {
        let recorded = self
            .engine
            .host_responded(job_id, host, host_index, error_number, result)
            .await;
        self.permit.lock().await.take();
        recorded
    }
}
