use std::sync::Arc;

use fanout_domain::{DispatchJobSnapshot, FailedHost, JobId, JobStatusSummary};
use fanout_core::KillOutcome;
use fanout_errors::FanoutResult;
use tracing::{debug, info, warn};

use crate::engine::DispatchEngine;

/// 面向运维层的查询和管理入口
pub struct DispatchController {
    engine: Arc<DispatchEngine>,
    default_list_limit: usize,
}

impl DispatchController {
    pub fn new(engine: Arc<DispatchEngine>, default_list_limit: usize) -> Self {
        Self {
            engine,
            default_list_limit,
        }
    }

    /// 列出描述串匹配 `pattern` 的作业，最多 `max_entries` 条
    pub async fn list_jobs(
        &self,
        max_entries: Option<usize>,
        pattern: Option<&str>,
    ) -> FanoutResult<Vec<String>> {
        let max_entries = max_entries.unwrap_or(self.default_list_limit);
        let jobs = self
            .engine
            .registry()
            .list_activities(max_entries, pattern)
            .await?;
        debug!("列出作业 {} 个（上限 {}）", jobs.len(), max_entries);
        Ok(jobs)
    }

    pub async fn job_status(&self, job_id: &JobId) -> FanoutResult<DispatchJobSnapshot> {
        self.engine.job_status(job_id).await
    }

    pub async fn summary(&self, job_id: &JobId) -> FanoutResult<JobStatusSummary> {
        Ok(self.engine.job_status(job_id).await?.summary())
    }

    /// 失败主机列表，用于只对失败主机重新下发
    pub async fn failed_hosts(&self, job_id: &JobId) -> FanoutResult<Vec<FailedHost>> {
        Ok(self.engine.job_status(job_id).await?.failed_hosts())
    }

    pub async fn cancel_job(&self, job_id: &JobId) -> FanoutResult<KillOutcome> {
        info!(job_id = %job_id, "取消分发作业: {}", job_id);
        self.engine.kill_job(job_id).await
    }

    /// 清除已结束作业的记录；未结束的作业不清除，返回 `false`
    pub async fn purge_job(&self, job_id: &JobId) -> FanoutResult<bool> {
        let snapshot = self.engine.job_status(job_id).await?;
        if !snapshot.is_finished() {
            warn!(
                job_id = %job_id,
                status = %snapshot.overall_status,
                "作业尚未结束，不能清除"
            );
            return Ok(false);
        }
        self.engine.end_job(job_id).await?;
        info!(job_id = %job_id, "已清除分发作业 {}", job_id);
        Ok(true)
    }
}
