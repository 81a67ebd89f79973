use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use fanout_core::{ActivityRegistry, RetentionConfig};
use fanout_domain::ActivityType;
use fanout_errors::FanoutResult;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, error, info, warn};

use crate::job::DispatchJob;

/// 一次清理的统计
#[derive(Debug, Default, Clone)]
pub struct SweepStats {
    pub scanned: usize,
    pub expired: usize,
    /// 已结束但尚未到期的作业
    pub retained: usize,
    pub duration: Duration,
}

/// 已完成分发作业的保留清理服务
///
/// 只清除进入终态且超过保留时间的作业；未结束的作业永不过期。
pub struct RetentionSweeper {
    registry: Arc<ActivityRegistry>,
    config: RetentionConfig,
    shutdown_tx: Option<oneshot::Sender<()>>,
    sweep_handle: Option<JoinHandle<()>>,
}

impl RetentionSweeper {
    pub fn new(registry: Arc<ActivityRegistry>, config: RetentionConfig) -> Self {
        Self {
            registry,
            config,
            shutdown_tx: None,
            sweep_handle: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.sweep_handle.is_some()
    }

    /// 启动后台清理任务；未启用时什么也不做
    pub async fn start(&mut self) -> FanoutResult<()> {
        if !self.config.enabled {
            info!("作业保留清理未启用");
            return Ok(());
        }
        if self.sweep_handle.is_some() {
            warn!("作业保留清理已在运行");
            return Ok(());
        }

        info!("启动作业保留清理: {:?}", self.config);

        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();
        self.shutdown_tx = Some(shutdown_tx);

        let registry = Arc::clone(&self.registry);
        let ttl = self.ttl();
        let period = Duration::from_secs(self.config.sweep_interval_seconds.max(1));

        let handle = tokio::spawn(async move {
            let mut ticker = interval(period);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = Self::sweep(&registry, ttl).await {
                            error!("作业保留清理失败: {}", e);
                        }
                    }
                    _ = &mut shutdown_rx => {
                        debug!("收到保留清理停止信号");
                        break;
                    }
                }
            }
            info!("作业保留清理已停止");
        });

        self.sweep_handle = Some(handle);
        Ok(())
    }

    pub async fn stop(&mut self) -> FanoutResult<()> {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(());
        }
        if let Some(handle) = self.sweep_handle.take() {
            if let Err(e) = handle.await {
                warn!("等待保留清理任务结束时出错: {}", e);
            }
        }
        Ok(())
    }

    /// 立即执行一次清理，不要求服务已启动
    pub async fn sweep_once(&self) -> FanoutResult<SweepStats> {
        Self::sweep(&self.registry, self.ttl()).await
    }

    /// 超出时间范围的保留时间视为永不过期
    fn ttl(&self) -> Option<chrono::Duration> {
        i64::try_from(self.config.completed_job_ttl_seconds)
            .ok()
            .and_then(chrono::Duration::try_seconds)
    }

    async fn sweep(
        registry: &ActivityRegistry,
        ttl: Option<chrono::Duration>,
    ) -> FanoutResult<SweepStats> {
        let started = Instant::now();
        let mut stats = SweepStats::default();
        let Some(cutoff) = ttl.and_then(|ttl| Utc::now().checked_sub_signed(ttl)) else {
            debug!("保留时间超出可表示范围，本次不清除任何作业");
            return Ok(stats);
        };

        for (context, activity) in registry.snapshot(Some(ActivityType::Dispatch)).await {
            stats.scanned += 1;
            let Ok(job) = activity.as_any().downcast::<DispatchJob>() else {
                continue;
            };
            let Some(finished_at) = job.finished_at().await else {
                continue;
            };
            if finished_at > cutoff {
                stats.retained += 1;
                continue;
            }
            match registry.expire_activity(&context.job_id).await {
                Ok(()) => {
                    stats.expired += 1;
                    debug!(job_id = %context.job_id, "作业 {} 超过保留时间，已清除", context.job_id);
                }
                // 与手工清除并发时作业可能已不在注册表中
                Err(e) => debug!(job_id = %context.job_id, "清除过期作业失败: {}", e),
            }
        }

        stats.duration = started.elapsed();
        if stats.expired > 0 {
            info!(
                "作业保留清理完成: 扫描 {} 个，清除 {} 个，保留 {} 个，耗时 {:?}",
                stats.scanned, stats.expired, stats.retained, stats.duration
            );
        }
        Ok(stats)
    }
}
