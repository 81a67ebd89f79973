use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use fanout_domain::{ActivityType, JobId};
use fanout_errors::{FanoutError, FanoutResult};
use globset::Glob;
use metrics::{counter, gauge};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::activity::{Activity, ActivityContext, KillOutcome, RemovalReason};
use crate::config::RegistryConfig;

#[derive(Clone)]
struct ActivityEntry {
    sequence: u64,
    context: ActivityContext,
    args: Arc<dyn Activity>,
}

struct Tombstone {
    job_id: JobId,
    reason: RemovalReason,
    removed_at: Instant,
}

#[derive(Default)]
struct RegistryState {
    activities: HashMap<JobId, ActivityEntry>,
    tombstones: VecDeque<Tombstone>,
    next_sequence: u64,
}

impl RegistryState {
    fn find(&self, job_id: &JobId) -> FanoutResult<&ActivityEntry> {
        self.activities
            .get(job_id)
            .ok_or_else(|| FanoutError::no_such_activity(job_id.as_str()))
    }

    fn find_mut(&mut self, job_id: &JobId) -> FanoutResult<&mut ActivityEntry> {
        self.activities
            .get_mut(job_id)
            .ok_or_else(|| FanoutError::no_such_activity(job_id.as_str()))
    }

    fn bury(&mut self, job_id: JobId, reason: RemovalReason, capacity: usize) {
        if capacity == 0 {
            return;
        }
        while self.tombstones.len() >= capacity {
            self.tombstones.pop_front();
        }
        self.tombstones.push_back(Tombstone {
            job_id,
            reason,
            removed_at: Instant::now(),
        });
    }
}

/// 进程级活动注册表
///
/// 一把锁只保护成员关系（插入、删除、遍历）。`details`/`destroy` 等调用方
/// 提供的代码总是在锁外执行，慢回调不会阻塞其他注册表操作。
pub struct ActivityRegistry {
    state: RwLock<RegistryState>,
    config: RegistryConfig,
}

impl ActivityRegistry {
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            state: RwLock::new(RegistryState {
                next_sequence: 1,
                ..RegistryState::default()
            }),
            config,
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// 注册新活动并同步返回其作业ID
    ///
    /// 注册表已满时返回 `ResourceExhausted`，注册表保持不变，`args` 随错误一起被丢弃。
    pub async fn start_activity(
        &self,
        activity_type: ActivityType,
        args: Arc<dyn Activity>,
    ) -> FanoutResult<JobId> {
        let mut state = self.state.write().await;
        if state.activities.len() >= self.config.max_activities {
            warn!(
                max_activities = self.config.max_activities,
                "活动注册表已满，拒绝新的 {} 活动", activity_type
            );
            return Err(FanoutError::ResourceExhausted(format!(
                "活动注册表已达到上限 {}",
                self.config.max_activities
            )));
        }

        let sequence = state.next_sequence;
        state.next_sequence += 1;
        let job_id = JobId::from_sequence(sequence);
        let entry = ActivityEntry {
            sequence,
            context: ActivityContext {
                job_id: job_id.clone(),
                activity_type,
                pid: None,
                tid: None,
                started_at: Utc::now(),
            },
            args,
        };
        state.activities.insert(job_id.clone(), entry);
        gauge!("fanout_registry_activities").set(state.activities.len() as f64);

        debug!(job_id = %job_id, activity_type = %activity_type, "注册活动");
        Ok(job_id)
    }

    /// 列出最多 `max_entries` 个描述与 shell glob `pattern` 匹配的活动
    ///
    /// 只在遍历快照时持有读锁，之后在锁外逐个调用 `details`。
    pub async fn list_activities(
        &self,
        max_entries: usize,
        pattern: Option<&str>,
    ) -> FanoutResult<Vec<String>> {
        let pattern = pattern.unwrap_or("*");
        let matcher = Glob::new(pattern)
            .map_err(|e| FanoutError::InvalidPattern {
                pattern: pattern.to_string(),
                message: e.to_string(),
            })?
            .compile_matcher();

        let mut entries: Vec<ActivityEntry> = {
            let state = self.state.read().await;
            state.activities.values().cloned().collect()
        };
        entries.sort_by_key(|entry| entry.sequence);

        let mut descriptors = Vec::new();
        for entry in entries {
            if descriptors.len() >= max_entries {
                break;
            }
            let descriptor = entry.args.details(&entry.context).await;
            if matcher.is_match(&descriptor) {
                descriptors.push(descriptor);
            }
        }
        Ok(descriptors)
    }

    /// 取消活动: 在锁内摘除，在锁外调用 `destroy`
    ///
    /// 类型不符视为不存在。不可取消的活动保持原样并返回 `NotCancelable`。
    pub async fn kill_activity(
        &self,
        job_id: &JobId,
        activity_type: ActivityType,
    ) -> FanoutResult<KillOutcome> {
        let entry = {
            let mut state = self.state.write().await;
            let entry = state.find(job_id)?;
            if entry.context.activity_type != activity_type {
                debug!(
                    job_id = %job_id,
                    expected = %activity_type,
                    actual = %entry.context.activity_type,
                    "活动类型不符"
                );
                return Err(FanoutError::no_such_activity(job_id.as_str()));
            }
            if !entry.args.is_cancelable() {
                info!(job_id = %job_id, "活动不可取消，忽略取消请求");
                return Ok(KillOutcome::NotCancelable);
            }
            let entry = state
                .activities
                .remove(job_id)
                .ok_or_else(|| FanoutError::no_such_activity(job_id.as_str()))?;
            state.bury(job_id.clone(), RemovalReason::Killed, self.config.tombstone_capacity);
            gauge!("fanout_registry_activities").set(state.activities.len() as f64);
            entry
        };

        if let Err(e) = entry.args.destroy(&entry.context).await {
            warn!(job_id = %job_id, "活动取消回调失败: {}", e);
        }
        counter!("fanout_activities_killed_total").increment(1);
        info!(job_id = %job_id, "活动已取消");
        Ok(KillOutcome::Killed)
    }

    /// 自行结束的活动只需移除记录，不调用 `destroy`
    pub async fn end_this_activity(&self, job_id: &JobId) -> FanoutResult<()> {
        self.remove(job_id, RemovalReason::Ended).await
    }

    /// 由保留策略清除过期活动
    pub async fn expire_activity(&self, job_id: &JobId) -> FanoutResult<()> {
        self.remove(job_id, RemovalReason::Expired).await
    }

    async fn remove(&self, job_id: &JobId, reason: RemovalReason) -> FanoutResult<()> {
        let mut state = self.state.write().await;
        state
            .activities
            .remove(job_id)
            .ok_or_else(|| FanoutError::no_such_activity(job_id.as_str()))?;
        state.bury(job_id.clone(), reason, self.config.tombstone_capacity);
        gauge!("fanout_registry_activities").set(state.activities.len() as f64);
        debug!(job_id = %job_id, reason = ?reason, "移除活动");
        Ok(())
    }

    /// 记录承载活动的进程或线程；`None` 表示保持原值
    pub async fn set_pid_or_tid(
        &self,
        job_id: &JobId,
        pid: Option<u32>,
        tid: Option<String>,
    ) -> FanoutResult<()> {
        let mut state = self.state.write().await;
        let entry = state.find_mut(job_id)?;
        if pid.is_some() {
            entry.context.pid = pid;
        }
        if tid.is_some() {
            entry.context.tid = tid;
        }
        Ok(())
    }

    /// 返回参数块的浅拷贝
    ///
    /// 返回的句柄与注册表中的活动共享同一份内部状态，调用方修改内部可变
    /// 状态会直接影响活动本身。
    pub async fn get_args(&self, job_id: &JobId) -> FanoutResult<Arc<dyn Activity>> {
        let state = self.state.read().await;
        Ok(Arc::clone(&state.find(job_id)?.args))
    }

    /// 按具体类型取回参数块；类型不符视为不存在
    pub async fn get_args_as<T: Activity>(&self, job_id: &JobId) -> FanoutResult<Arc<T>> {
        self.get_args(job_id)
            .await?
            .as_any()
            .downcast::<T>()
            .map_err(|_| FanoutError::no_such_activity(job_id.as_str()))
    }

    pub async fn get_context(&self, job_id: &JobId) -> FanoutResult<ActivityContext> {
        let state = self.state.read().await;
        Ok(state.find(job_id)?.context.clone())
    }

    /// 某类型全部活动的快照，按创建顺序排列
    pub async fn snapshot(
        &self,
        activity_type: Option<ActivityType>,
    ) -> Vec<(ActivityContext, Arc<dyn Activity>)> {
        let state = self.state.read().await;
        let mut entries: Vec<&ActivityEntry> = state
            .activities
            .values()
            .filter(|entry| activity_type.map_or(true, |t| entry.context.activity_type == t))
            .collect();
        entries.sort_by_key(|entry| entry.sequence);
        entries
            .into_iter()
            .map(|entry| (entry.context.clone(), Arc::clone(&entry.args)))
            .collect()
    }

    pub async fn contains(&self, job_id: &JobId) -> bool {
        self.state.read().await.activities.contains_key(job_id)
    }

    pub async fn count(&self) -> usize {
        self.state.read().await.activities.len()
    }

    /// 区分"从未存在"和"最近被移除"；过期墓碑在查询时清理
    pub async fn was_recently_removed(&self, job_id: &JobId) -> Option<RemovalReason> {
        let ttl = Duration::from_secs(self.config.tombstone_ttl_seconds);
        let mut state = self.state.write().await;
        while state
            .tombstones
            .front()
            .is_some_and(|t| t.removed_at.elapsed() > ttl)
        {
            state.tombstones.pop_front();
        }
        state
            .tombstones
            .iter()
            .rev()
            .find(|t| &t.job_id == job_id)
            .map(|t| t.reason)
    }
}

impl Default for ActivityRegistry {
    fn default() -> Self {
        Self::new(RegistryConfig::default())
    }
}
