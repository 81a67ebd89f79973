use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use fanout_core::{ActivityRegistry, AppConfig, KillOutcome};
use fanout_dispatcher::{DispatchController, DispatchEngine, RetentionSweeper};
use fanout_domain::{ClusterOperation, DispatchJobSnapshot, JobId};
use fanout_errors::FanoutError;
use fanout_worker::{build_executor, LocalTransport};
use serde::Serialize;
use tokio::sync::{broadcast, Mutex};
use tracing::{info, warn};

/// 一次 `dispatch` 的请求
#[derive(Debug, Clone)]
pub struct DispatchRequest {
    pub op: ClusterOperation,
    pub hosts: Vec<String>,
    pub args: serde_json::Value,
    pub wait: Duration,
}

/// 等待作业结束的方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitOutcome {
    Finished,
    TimedOut,
    Interrupted,
}

#[derive(Debug, Clone, Serialize)]
pub struct DispatchReport {
    pub outcome: WaitOutcome,
    /// 本机出现在目标列表中，被排除在扇出之外
    pub local_host_excluded: bool,
    pub job: DispatchJobSnapshot,
}

impl DispatchReport {
    pub fn is_success(&self) -> bool {
        self.outcome == WaitOutcome::Finished && self.job.is_fully_successful()
    }
}

/// 主应用程序：注册表、本地传输层、分发引擎和保留清理的装配
pub struct Application {
    config: AppConfig,
    registry: Arc<ActivityRegistry>,
    transport: Arc<LocalTransport>,
    engine: Arc<DispatchEngine>,
    controller: DispatchController,
    sweeper: Mutex<RetentionSweeper>,
}

impl Application {
    pub fn new(config: AppConfig) -> Result<Self> {
        let registry = Arc::new(ActivityRegistry::new(config.registry.clone()));
        let executor = build_executor(&config.worker).context("创建主机执行器失败")?;
        let transport = Arc::new(
            LocalTransport::new(executor)
                .with_call_timeout(Duration::from_secs(config.worker.host_call_timeout_seconds))
                .with_registry(Arc::clone(&registry)),
        );
        let engine = Arc::new(DispatchEngine::new(
            Arc::clone(&registry),
            transport.clone(),
            &config.dispatcher,
        ));
        let controller =
            DispatchController::new(Arc::clone(&engine), config.dispatcher.default_list_limit);
        let sweeper = Mutex::new(RetentionSweeper::new(
            Arc::clone(&registry),
            config.retention.clone(),
        ));

        info!(local_host = engine.local_host(), "应用程序初始化完成");

        Ok(Self {
            config,
            registry,
            transport,
            engine,
            controller,
            sweeper,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn controller(&self) -> &DispatchController {
        &self.controller
    }

    pub fn registry(&self) -> &Arc<ActivityRegistry> {
        &self.registry
    }

    pub async fn start(&self) -> Result<()> {
        self.sweeper.lock().await.start().await?;
        Ok(())
    }

    /// 下发一次集群操作并等待其结束、超时或收到关闭信号
    ///
    /// 超时或中断时作业被取消，报告中是取消前的最后状态。
    pub async fn dispatch(
        &self,
        request: DispatchRequest,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> Result<DispatchReport> {
        let normalized = self
            .engine
            .normalize_targets(request.hosts.iter().map(Some));
        if normalized.found_local_host {
            info!("本机 {} 在目标列表中，不经扇出下发", self.engine.local_host());
        }

        let job_id = self
            .engine
            .multiplex_request(request.op, normalized.hosts, request.args, None)
            .await
            .context("创建分发作业失败")?;

        let outcome = tokio::select! {
            waited = self.engine.wait_for_completion(&job_id, request.wait) => match waited {
                Ok(_) => WaitOutcome::Finished,
                Err(FanoutError::Timeout(msg)) => {
                    warn!(job_id = %job_id, "{}", msg);
                    WaitOutcome::TimedOut
                }
                Err(e) => return Err(anyhow::Error::new(e).context("等待作业完成失败")),
            },
            _ = shutdown_rx.recv() => {
                warn!(job_id = %job_id, "收到关闭信号，取消分发作业");
                WaitOutcome::Interrupted
            }
        };

        let job = self.engine.job_status(&job_id).await?;
        if outcome != WaitOutcome::Finished {
            self.cancel(&job_id).await;
        }

        Ok(DispatchReport {
            outcome,
            local_host_excluded: normalized.found_local_host,
            job,
        })
    }

    async fn cancel(&self, job_id: &JobId) {
        match self.controller.cancel_job(job_id).await {
            Ok(KillOutcome::Killed) => {}
            Ok(KillOutcome::NotCancelable) => warn!(job_id = %job_id, "作业不可取消"),
            Err(e) => warn!(job_id = %job_id, "取消作业失败: {}", e),
        }
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.sweeper.lock().await.stop().await?;
        self.transport.cancel_all().await;
        info!("应用程序已关闭，剩余作业 {} 个", self.registry.count().await);
        Ok(())
    }
}
