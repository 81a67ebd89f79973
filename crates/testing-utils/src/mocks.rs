//! 传输层与后置阶段的测试替身

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use fanout_dispatcher::{HostCall, HostCallbacks, HostTransport, PostPhase, PostPhaseFailure};
use fanout_domain::{DispatchJobSnapshot, JobId};
use fanout_errors::{FanoutError, FanoutResult};
use tokio::sync::Notify;

/// 只记录调用、不自动回调的传输层；测试自己决定何时、以什么顺序响应
#[derive(Clone, Default)]
pub struct ManualTransport {
    calls: Arc<Mutex<Vec<(HostCall, Arc<dyn HostCallbacks>)>>>,
    canceled: Arc<Mutex<Vec<JobId>>>,
    arrived: Arc<Notify>,
}

impl ManualTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<HostCall> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(call, _)| call.clone())
            .collect()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn canceled(&self) -> Vec<JobId> {
        self.canceled.lock().unwrap().clone()
    }

    /// 等待至少 `count` 个调用到达
    pub async fn wait_for_calls(&self, count: usize, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, async {
            loop {
                let notified = self.arrived.notified();
                if self.call_count() >= count {
                    return;
                }
                notified.await;
            }
        })
        .await
        .is_ok()
    }

    fn find(&self, job_id: &JobId, host_index: usize) -> Option<(HostCall, Arc<dyn HostCallbacks>)> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .find(|(call, _)| &call.job_id == job_id && call.host_index == host_index)
            .map(|(call, callbacks)| (call.clone(), Arc::clone(callbacks)))
    }

    /// 通过记录下来的回调模拟主机开始执行
    pub async fn start(&self, job_id: &JobId, host_index: usize) -> FanoutResult<()> {
        let (call, callbacks) = self
            .find(job_id, host_index)
            .ok_or_else(|| FanoutError::Internal(format!("没有记录到主机 {host_index} 的调用")))?;
        callbacks
            .calling_host(&call.job_id, &call.host, call.host_index)
            .await
    }

    /// 通过记录下来的回调模拟主机返回
    pub async fn respond(
        &self,
        job_id: &JobId,
        host_index: usize,
        error_number: i32,
        result: Option<&str>,
    ) -> FanoutResult<()> {
        let (call, callbacks) = self
            .find(job_id, host_index)
            .ok_or_else(|| FanoutError::Internal(format!("没有记录到主机 {host_index} 的调用")))?;
        callbacks
            .host_responded(
                &call.job_id,
                &call.host,
                call.host_index,
                error_number,
                result.map(str::to_string),
            )
            .await
    }
}

#[async_trait]
impl HostTransport for ManualTransport {
    async fn send_request(
        &self,
        call: HostCall,
        callbacks: Arc<dyn HostCallbacks>,
    ) -> FanoutResult<()> {
        self.calls.lock().unwrap().push((call, callbacks));
        self.arrived.notify_waiters();
        Ok(())
    }

    async fn cancel(&self, job_id: &JobId) -> FanoutResult<()> {
        self.canceled.lock().unwrap().push(job_id.clone());
        Ok(())
    }
}

/// 对指定主机（为空时对全部主机）拒绝发送请求
#[derive(Clone, Default)]
pub struct FailingTransport {
    failing_hosts: HashSet<String>,
    delivered: ScriptedTransport,
}

impl FailingTransport {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn for_hosts(hosts: &[&str]) -> Self {
        Self {
            failing_hosts: hosts.iter().map(|h| h.to_string()).collect(),
            delivered: ScriptedTransport::default(),
        }
    }
}

#[async_trait]
impl HostTransport for FailingTransport {
    async fn send_request(
        &self,
        call: HostCall,
        callbacks: Arc<dyn HostCallbacks>,
    ) -> FanoutResult<()> {
        if self.failing_hosts.is_empty() || self.failing_hosts.contains(&call.host) {
            return Err(FanoutError::transport(format!("无法连接主机 {}", call.host)));
        }
        self.delivered.send_request(call, callbacks).await
    }

    async fn cancel(&self, _job_id: &JobId) -> FanoutResult<()> {
        Ok(())
    }
}

/// 立即在后台任务中完成调用的传输层，按主机名返回预设的错误号
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    errors: HashMap<String, i32>,
    delay: Duration,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_error(mut self, host: &str, error_number: i32) -> Self {
        self.errors.insert(host.to_string(), error_number);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl HostTransport for ScriptedTransport {
    async fn send_request(
        &self,
        call: HostCall,
        callbacks: Arc<dyn HostCallbacks>,
    ) -> FanoutResult<()> {
        let error_number = self.errors.get(&call.host).copied().unwrap_or(0);
        let delay = self.delay;
        tokio::spawn(async move {
            let _ = callbacks
                .calling_host(&call.job_id, &call.host, call.host_index)
                .await;
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let result = format!("{} on {}", call.func_id, call.host);
            let _ = callbacks
                .host_responded(
                    &call.job_id,
                    &call.host,
                    call.host_index,
                    error_number,
                    Some(result),
                )
                .await;
        });
        Ok(())
    }

    async fn cancel(&self, _job_id: &JobId) -> FanoutResult<()> {
        Ok(())
    }
}

/// 记录调用次数和调用时作业状态的后置阶段
#[derive(Clone, Default)]
pub struct RecordingPostPhase {
    invocations: Arc<AtomicUsize>,
    seen: Arc<Mutex<Vec<DispatchJobSnapshot>>>,
    failure: Option<PostPhaseFailure>,
    delay: Duration,
}

impl RecordingPostPhase {
    pub fn succeeding() -> Self {
        Self::default()
    }

    pub fn failing(code: i32, message: &str) -> Self {
        Self {
            failure: Some(PostPhaseFailure::new(code, message)),
            ..Self::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn invocations(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<DispatchJobSnapshot> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl PostPhase for RecordingPostPhase {
    async fn finalize(&self, job: &DispatchJobSnapshot) -> Result<(), PostPhaseFailure> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(job.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match &self.failure {
            Some(failure) => Err(failure.clone()),
            None => Ok(()),
        }
    }
}
