use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value_objects::{ClusterOperation, JobId};

/// 单个主机的调用状态，只能沿 NOT_YET_CALLED → PENDING → {SUCCEEDED|FAILED} 前进
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HostStatus {
    NotYetCalled,
    Pending,
    Succeeded,
    Failed,
}

impl HostStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, HostStatus::Succeeded | HostStatus::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostResponse {
    pub status: HostStatus,
    pub error: i32,
    pub result: Option<String>,
}

impl Default for HostResponse {
    fn default() -> Self {
        Self {
            status: HostStatus::NotYetCalled,
            error: 0,
            result: None,
        }
    }
}

/// 作业整体状态
///
/// `INITIALIZING → PENDING → {DONE | POST_PHASE_PENDING → {POST_PHASE_SUCCEEDED | POST_PHASE_FAILED}}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OverallStatus {
    Initializing,
    Pending,
    Done,
    PostPhasePending,
    PostPhaseSucceeded,
    PostPhaseFailed,
}

impl OverallStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OverallStatus::Done | OverallStatus::PostPhaseSucceeded | OverallStatus::PostPhaseFailed
        )
    }

    pub fn can_transition_to(&self, next: OverallStatus) -> bool {
        use OverallStatus::*;
        match (self, next) {
            (Initializing, Pending) => true,
            // 零主机作业不经过 PENDING
            (Initializing | Pending, Done | PostPhasePending) => true,
            (PostPhasePending, PostPhaseSucceeded | PostPhaseFailed) => true,
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OverallStatus::Initializing => "INITIALIZING",
            OverallStatus::Pending => "PENDING",
            OverallStatus::Done => "DONE",
            OverallStatus::PostPhasePending => "POST_PHASE_PENDING",
            OverallStatus::PostPhaseSucceeded => "POST_PHASE_SUCCEEDED",
            OverallStatus::PostPhaseFailed => "POST_PHASE_FAILED",
        }
    }
}

impl std::fmt::Display for OverallStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 分发作业在某一时刻的只读快照
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchJobSnapshot {
    pub job_id: JobId,
    pub func_id: ClusterOperation,
    pub args: serde_json::Value,
    pub hosts: Vec<String>,
    pub host_count: usize,
    pub hosts_called: usize,
    pub hosts_responded: usize,
    pub responses: Vec<HostResponse>,
    pub overall_status: OverallStatus,
    pub overall_error_num: Option<i32>,
    pub overall_error_msg: Option<String>,
    pub has_post_phase: bool,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
}

/// 失败主机条目，用于只对失败主机重试
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedHost {
    pub host_index: usize,
    pub host: String,
    pub error: i32,
    pub result: Option<String>,
}

impl DispatchJobSnapshot {
    pub fn is_finished(&self) -> bool {
        self.overall_status.is_terminal()
    }

    pub fn failed_hosts(&self) -> Vec<FailedHost> {
        self.hosts
            .iter()
            .zip(self.responses.iter())
            .enumerate()
            .filter(|(_, (_, response))| response.status == HostStatus::Failed)
            .map(|(host_index, (host, response))| FailedHost {
                host_index,
                host: host.clone(),
                error: response.error,
                result: response.result.clone(),
            })
            .collect()
    }

    pub fn summary(&self) -> JobStatusSummary {
        let mut summary = JobStatusSummary::default();
        for response in &self.responses {
            match response.status {
                HostStatus::NotYetCalled => summary.not_yet_called += 1,
                HostStatus::Pending => summary.pending += 1,
                HostStatus::Succeeded => summary.succeeded += 1,
                HostStatus::Failed => summary.failed += 1,
            }
        }
        summary
    }

    /// 整体是否成功: 所有主机成功，且 post-phase（如有）成功
    pub fn is_fully_successful(&self) -> bool {
        match self.overall_status {
            OverallStatus::Done | OverallStatus::PostPhaseSucceeded => {
                self.summary().failed == 0
            }
            _ => false,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatusSummary {
    pub not_yet_called: usize,
    pub pending: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl JobStatusSummary {
    pub fn total(&self) -> usize {
        self.not_yet_called + self.pending + self.succeeded + self.failed
    }
    pub fn active(&self) -> usize {
        self.not_yet_called + self.pending
    }
    pub fn finished(&self) -> usize {
        self.succeeded + self.failed
    }
}
