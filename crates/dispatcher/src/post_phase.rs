use async_trait::async_trait;
use fanout_domain::DispatchJobSnapshot;
use fanout_errors::POST_PHASE_FAILED;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("post-phase 失败 ({code}): {message}")]
pub struct PostPhaseFailure {
    pub code: i32,
    pub message: String,
}

impl PostPhaseFailure {
    pub fn new<S: Into<String>>(code: i32, message: S) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// 所有主机响应之后恰好运行一次的收尾步骤
///
/// 这是判定"集群操作整体是否成功"的唯一位置，结果记录在作业的整体状态中，
/// 不会作为错误抛给任何调用方。运行时不持有任何协调锁。
#[async_trait]
pub trait PostPhase: Send + Sync {
    async fn finalize(&self, job: &DispatchJobSnapshot) -> Result<(), PostPhaseFailure>;
}

/// 把同步闭包包装成 post-phase
pub struct FnPostPhase<F>(pub F);

#[async_trait]
impl<F> PostPhase for FnPostPhase<F>
where
    F: Fn(&DispatchJobSnapshot) -> Result<(), PostPhaseFailure> + Send + Sync,
{
    async fn finalize(&self, job: &DispatchJobSnapshot) -> Result<(), PostPhaseFailure> {
        (self.0)(job)
    }
}

/// 只有全部主机成功时整体才算成功
#[derive(Debug, Default, Clone, Copy)]
pub struct RequireAllHostsSucceeded;

#[async_trait]
impl PostPhase for RequireAllHostsSucceeded {
    async fn finalize(&self, job: &DispatchJobSnapshot) -> Result<(), PostPhaseFailure> {
        let failed = job.failed_hosts();
        if failed.is_empty() {
            return Ok(());
        }
        let names: Vec<&str> = failed.iter().map(|f| f.host.as_str()).collect();
        Err(PostPhaseFailure::new(
            POST_PHASE_FAILED,
            format!("{} 个主机失败: {}", failed.len(), names.join(",")),
        ))
    }
}
