use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// 本机主机名，未设置时从操作系统获取
    pub local_hostname: Option<String>,
    /// 同时在途的主机调用上限
    pub max_concurrent_calls: usize,
    pub default_list_limit: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            local_hostname: None,
            max_concurrent_calls: 256,
            default_list_limit: 100,
        }
    }
}

impl DispatcherConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_concurrent_calls == 0 {
            return Err(anyhow::anyhow!("最大并发调用数必须大于0"));
        }
        if self.default_list_limit == 0 {
            return Err(anyhow::anyhow!("默认列表上限必须大于0"));
        }
        if let Some(name) = &self.local_hostname {
            if name.trim().is_empty() {
                return Err(anyhow::anyhow!("本机主机名不能为空"));
            }
        }
        Ok(())
    }

    pub fn resolve_local_hostname(&self) -> String {
        if let Some(name) = &self.local_hostname {
            return name.clone();
        }
        match hostname::get() {
            Ok(name) => name.to_string_lossy().into_owned(),
            Err(e) => {
                warn!("获取本机主机名失败，使用 localhost: {}", e);
                "localhost".to_string()
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutorKind {
    DryRun,
    Command,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// 单个主机调用的超时时间，0 表示不设超时
    pub host_call_timeout_seconds: u64,
    pub executor: ExecutorKind,
    pub command_program: Option<String>,
    /// 支持 `{host}`、`{op}`、`{job_id}`、`{args}` 占位符
    pub command_args: Vec<String>,
    pub dry_run_delay_ms: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            host_call_timeout_seconds: 300,
            executor: ExecutorKind::DryRun,
            command_program: None,
            command_args: Vec::new(),
            dry_run_delay_ms: 50,
        }
    }
}

impl WorkerConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.executor == ExecutorKind::Command {
            match &self.command_program {
                Some(program) if !program.trim().is_empty() => {}
                _ => return Err(anyhow::anyhow!("command 执行器必须配置 command_program")),
            }
        }
        Ok(())
    }
}
