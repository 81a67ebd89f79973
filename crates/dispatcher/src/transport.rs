//! 主机调用的传输边界
//!
//! 分发层只定义回调契约：传输层在真正发出请求时调用 `calling_host`，在请求
//! 完成（成功或失败）时调用一次 `host_responded`。请求如何送达远端（套接字
//! RPC、本地任务、队列）由实现者决定。

use std::sync::Arc;

use async_trait::async_trait;
use fanout_domain::{ClusterOperation, JobId};
use fanout_errors::FanoutResult;

/// 发往单个主机的一次调用
#[derive(Debug, Clone)]
pub struct HostCall {
    pub func_id: ClusterOperation,
    pub job_id: JobId,
    pub host: String,
    pub host_index: usize,
    /// 所有主机共享作业的参数块
    pub args: Arc<serde_json::Value>,
}

/// 传输层回调到分发引擎的入口
#[async_trait]
pub trait HostCallbacks: Send + Sync {
    async fn calling_host(&self, job_id: &JobId, host: &str, host_index: usize)
        -> FanoutResult<()>;

    async fn host_responded(
        &self,
        job_id: &JobId,
        host: &str,
        host_index: usize,
        error_number: i32,
        result: Option<String>,
    ) -> FanoutResult<()>;
}

#[async_trait]
pub trait HostTransport: Send + Sync {
    /// 发出请求。返回错误表示请求根本没有发出，引擎会为该主机合成一次失败响应。
    async fn send_request(
        &self,
        call: HostCall,
        callbacks: Arc<dyn HostCallbacks>,
    ) -> FanoutResult<()>;

    /// 尽力通知某个作业尚未完成的调用停止
    async fn cancel(&self, job_id: &JobId) -> FanoutResult<()>;
}
