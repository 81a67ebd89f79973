use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fanout_core::{Activity, ActivityContext};
use fanout_domain::{
    ClusterOperation, DispatchJobSnapshot, HostList, HostResponse, JobId, OverallStatus,
};
use fanout_errors::FanoutResult;
use tokio::sync::{watch, Mutex, MutexGuard};
use tracing::debug;

use crate::post_phase::PostPhase;
use crate::transport::HostTransport;

/// 作业中会被并发修改的字段，由每个作业自己的锁保护
#[derive(Debug)]
pub(crate) struct JobState {
    pub(crate) hosts_called: usize,
    pub(crate) hosts_responded: usize,
    pub(crate) responses: Vec<HostResponse>,
    pub(crate) overall_status: OverallStatus,
    pub(crate) overall_error_num: Option<i32>,
    pub(crate) overall_error_msg: Option<String>,
    pub(crate) start_time: DateTime<Utc>,
    pub(crate) end_time: Option<DateTime<Utc>>,
}

/// 一次集群操作在固定主机集合上的扇出/扇入记录
///
/// 创建后 `func_id`、`args`、`hosts` 不再变化；其余字段只能通过引擎的
/// `calling_host`/`host_responded` 和收尾步骤修改。
pub struct DispatchJob {
    func_id: ClusterOperation,
    args: Arc<serde_json::Value>,
    hosts: Vec<String>,
    post_phase: Option<Arc<dyn PostPhase>>,
    transport: Arc<dyn HostTransport>,
    state: Mutex<JobState>,
    status_tx: watch::Sender<OverallStatus>,
}

impl DispatchJob {
    pub(crate) fn new(
        func_id: ClusterOperation,
        hosts: HostList,
        args: serde_json::Value,
        post_phase: Option<Arc<dyn PostPhase>>,
        transport: Arc<dyn HostTransport>,
    ) -> Self {
        let hosts = hosts.into_inner();
        let (status_tx, _) = watch::channel(OverallStatus::Initializing);
        Self {
            func_id,
            args: Arc::new(args),
            state: Mutex::new(JobState {
                hosts_called: 0,
                hosts_responded: 0,
                responses: vec![HostResponse::default(); hosts.len()],
                overall_status: OverallStatus::Initializing,
                overall_error_num: None,
                overall_error_msg: None,
                start_time: Utc::now(),
                end_time: None,
            }),
            hosts,
            post_phase,
            transport,
            status_tx,
        }
    }

    pub fn func_id(&self) -> ClusterOperation {
        self.func_id
    }

    pub fn hosts(&self) -> &[String] {
        &self.hosts
    }

    pub fn host_count(&self) -> usize {
        self.hosts.len()
    }

    pub(crate) fn args(&self) -> &Arc<serde_json::Value> {
        &self.args
    }

    pub(crate) fn post_phase(&self) -> Option<Arc<dyn PostPhase>> {
        self.post_phase.clone()
    }

    pub(crate) async fn lock_state(&self) -> MutexGuard<'_, JobState> {
        self.state.lock().await
    }

    /// 修改整体状态并通知等待者；非法迁移被忽略
    pub(crate) fn set_overall_status(&self, state: &mut JobState, next: OverallStatus) -> bool {
        if !state.overall_status.can_transition_to(next) {
            debug!(
                from = %state.overall_status,
                to = %next,
                "忽略非法的整体状态迁移"
            );
            return false;
        }
        state.overall_status = next;
        self.status_tx.send_replace(next);
        true
    }

    pub fn subscribe(&self) -> watch::Receiver<OverallStatus> {
        self.status_tx.subscribe()
    }

    pub async fn overall_status(&self) -> OverallStatus {
        self.state.lock().await.overall_status
    }

    /// 进入终态的时间；未结束的作业返回 `None`
    pub async fn finished_at(&self) -> Option<DateTime<Utc>> {
        let state = self.state.lock().await;
        if state.overall_status.is_terminal() {
            state.end_time
        } else {
            None
        }
    }

    pub async fn snapshot(&self, job_id: &JobId) -> DispatchJobSnapshot {
        let state = self.state.lock().await;
        self.snapshot_locked(job_id, &state)
    }

    pub(crate) fn snapshot_locked(&self, job_id: &JobId, state: &JobState) -> DispatchJobSnapshot {
        DispatchJobSnapshot {
            job_id: job_id.clone(),
            func_id: self.func_id,
            args: (*self.args).clone(),
            hosts: self.hosts.clone(),
            host_count: self.hosts.len(),
            hosts_called: state.hosts_called,
            hosts_responded: state.hosts_responded,
            responses: state.responses.clone(),
            overall_status: state.overall_status,
            overall_error_num: state.overall_error_num,
            overall_error_msg: state.overall_error_msg.clone(),
            has_post_phase: self.post_phase.is_some(),
            start_time: state.start_time,
            end_time: state.end_time,
        }
    }
}

#[async_trait]
impl Activity for DispatchJob {
    async fn details(&self, context: &ActivityContext) -> String {
        let state = self.state.lock().await;
        let mut details = format!(
            "activityid={} type={} func={} hosts={} called={} responded={} status={} starttime={}",
            context.job_id,
            context.activity_type,
            self.func_id,
            self.hosts.len(),
            state.hosts_called,
            state.hosts_responded,
            state.overall_status,
            state.start_time.timestamp(),
        );
        if let Some(end_time) = state.end_time {
            details.push_str(&format!(" endtime={}", end_time.timestamp()));
        }
        if let Some(pid) = context.pid {
            details.push_str(&format!(" pid={pid}"));
        }
        details
    }

    fn is_cancelable(&self) -> bool {
        true
    }

    async fn destroy(&self, context: &ActivityContext) -> FanoutResult<()> {
        debug!(job_id = %context.job_id, "通知传输层取消未完成的主机调用");
        self.transport.cancel(&context.job_id).await
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}
