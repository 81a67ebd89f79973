use serde::{Deserialize, Serialize};

/// 已完成作业保留时间上限（十年）
pub const MAX_COMPLETED_JOB_TTL_SECONDS: u64 = 10 * 365 * 24 * 3600;

/// 已完成作业的保留策略，默认不自动清理
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    pub enabled: bool,
    pub completed_job_ttl_seconds: u64,
    pub sweep_interval_seconds: u64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            completed_job_ttl_seconds: 3600,
            sweep_interval_seconds: 60,
        }
    }
}

impl RetentionConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.completed_job_ttl_seconds > MAX_COMPLETED_JOB_TTL_SECONDS {
            return Err(anyhow::anyhow!(
                "已完成作业保留时间不能超过 {} 秒",
                MAX_COMPLETED_JOB_TTL_SECONDS
            ));
        }
        if !self.enabled {
            return Ok(());
        }
        if self.sweep_interval_seconds == 0 {
            return Err(anyhow::anyhow!("清理间隔必须大于0"));
        }
        Ok(())
    }
}
