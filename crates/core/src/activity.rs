use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fanout_domain::{ActivityType, JobId};
use fanout_errors::FanoutResult;
use serde::{Deserialize, Serialize};

/// 注册表中一个可追踪、可查询、可能可取消的异步工作单元
///
/// 实现类型本身就是活动的参数块，由注册表持有。`details` 和 `destroy`
/// 都在注册表锁之外调用，因此可能看到与注册表短暂不一致的状态。
#[async_trait]
pub trait Activity: Send + Sync + 'static {
    /// 生成供列表查询和模式匹配使用的描述字符串
    async fn details(&self, context: &ActivityContext) -> String;

    /// 没有取消逻辑的活动不可取消，`kill_activity` 对其是空操作
    fn is_cancelable(&self) -> bool {
        false
    }

    /// 尽力通知活动停止；在活动从注册表摘除之后调用
    async fn destroy(&self, _context: &ActivityContext) -> FanoutResult<()> {
        Ok(())
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

/// 注册表为活动保存的元数据
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityContext {
    pub job_id: JobId,
    pub activity_type: ActivityType,
    pub pid: Option<u32>,
    pub tid: Option<String>,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KillOutcome {
    /// 已摘除并调用了 destroy
    Killed,
    /// 活动不可取消，注册表未改变
    NotCancelable,
}

/// 活动从注册表中移除的原因，记录在墓碑中
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalReason {
    Killed,
    Ended,
    Expired,
}
