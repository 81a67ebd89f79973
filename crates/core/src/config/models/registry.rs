use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// 注册表最多容纳的活动数，超过后拒绝新活动
    pub max_activities: usize,
    /// 最近移除的作业ID最多保留多少个
    pub tombstone_capacity: usize,
    pub tombstone_ttl_seconds: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_activities: 4096,
            tombstone_capacity: 1024,
            tombstone_ttl_seconds: 600,
        }
    }
}

impl RegistryConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_activities == 0 {
            return Err(anyhow::anyhow!("活动注册表容量必须大于0"));
        }
        if self.tombstone_capacity > 0 && self.tombstone_ttl_seconds == 0 {
            return Err(anyhow::anyhow!("启用墓碑时墓碑保留时间必须大于0"));
        }
        Ok(())
    }
}
