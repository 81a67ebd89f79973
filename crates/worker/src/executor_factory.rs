use std::sync::Arc;
use std::time::Duration;

use fanout_core::{ExecutorKind, WorkerConfig};
use fanout_errors::{FanoutError, FanoutResult};
use tracing::info;

use crate::executors::{CommandExecutor, DryRunExecutor, HostExecutor};

/// 按配置创建主机执行器
pub fn build_executor(config: &WorkerConfig) -> FanoutResult<Arc<dyn HostExecutor>> {
    let executor: Arc<dyn HostExecutor> = match config.executor {
        ExecutorKind::DryRun => Arc::new(DryRunExecutor::new(Duration::from_millis(
            config.dry_run_delay_ms,
        ))),
        ExecutorKind::Command => {
            let program = config
                .command_program
                .as_deref()
                .filter(|p| !p.trim().is_empty())
                .ok_or_else(|| FanoutError::config_error("command 执行器需要配置 command_program"))?;
            Arc::new(CommandExecutor::new(program, config.command_args.clone()))
        }
    };
    info!("使用主机执行器: {}", executor.name());
    Ok(executor)
}
