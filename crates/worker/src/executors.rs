use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use fanout_dispatcher::HostCall;
use fanout_errors::{FanoutError, FanoutResult};
use serde::Deserialize;
use tokio::process::Command;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// 单个主机调用的结果，`error_number` 为 0 表示成功
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostOutcome {
    pub error_number: i32,
    pub result: Option<String>,
}

impl HostOutcome {
    pub fn succeeded<S: Into<String>>(result: S) -> Self {
        Self {
            error_number: 0,
            result: Some(result.into()),
        }
    }

    pub fn failed<S: Into<String>>(error_number: i32, result: S) -> Self {
        Self {
            error_number,
            result: Some(result.into()),
        }
    }
}

/// 在某个主机上真正执行集群操作的一方
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HostExecutor: Send + Sync {
    /// 返回 `Err` 表示执行机制本身出错，而不是操作在主机上失败
    async fn execute(&self, call: &HostCall) -> FanoutResult<HostOutcome>;

    fn name(&self) -> &'static str;
}

/// `DryRunExecutor` 识别的参数字段
#[derive(Debug, Default, Deserialize)]
struct DryRunArgs {
    #[serde(default)]
    fail_hosts: Vec<String>,
    fail_error: Option<i32>,
}

/// 不触碰主机的演练执行器
///
/// 等待固定时间后成功；`args.fail_hosts` 中列出的主机以 `args.fail_error`
/// （默认 1）失败。
pub struct DryRunExecutor {
    delay: Duration,
}

impl DryRunExecutor {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Default for DryRunExecutor {
    fn default() -> Self {
        Self::new(Duration::from_millis(50))
    }
}

#[async_trait]
impl HostExecutor for DryRunExecutor {
    async fn execute(&self, call: &HostCall) -> FanoutResult<HostOutcome> {
        let args: DryRunArgs = match serde_json::from_value((*call.args).clone()) {
            Ok(args) => args,
            Err(e) => {
                warn!(job_id = %call.job_id, host = %call.host, "演练参数解析失败，按默认处理: {}", e);
                DryRunArgs::default()
            }
        };
        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }

        if args.fail_hosts.iter().any(|host| host == &call.host) {
            let error_number = args.fail_error.unwrap_or(1);
            debug!(job_id = %call.job_id, host = %call.host, error_number, "演练: 主机按要求失败");
            return Ok(HostOutcome::failed(
                error_number,
                format!("dry-run {} failed on {}", call.func_id, call.host),
            ));
        }

        Ok(HostOutcome::succeeded(format!(
            "dry-run {} on {}",
            call.func_id, call.host
        )))
    }

    fn name(&self) -> &'static str {
        "dry_run"
    }
}

/// 为每个主机启动一个外部程序的执行器
///
/// 参数模板支持 `{host}`、`{op}`、`{job_id}`、`{args}`（紧凑 JSON）。退出码即
/// 错误号；成功时结果为 stdout，失败时优先取 stderr。
pub struct CommandExecutor {
    program: String,
    arg_templates: Vec<String>,
}

impl CommandExecutor {
    pub fn new<S: Into<String>>(program: S, arg_templates: Vec<String>) -> Self {
        Self {
            program: program.into(),
            arg_templates,
        }
    }

    pub fn render_args(&self, call: &HostCall) -> Vec<String> {
        let args_json = call.args.to_string();
        let job_id = call.job_id.to_string();
        self.arg_templates
            .iter()
            .map(|template| {
                template
                    .replace("{host}", &call.host)
                    .replace("{op}", call.func_id.as_str())
                    .replace("{job_id}", &job_id)
                    .replace("{args}", &args_json)
            })
            .collect()
    }
}

#[async_trait]
impl HostExecutor for CommandExecutor {
    async fn execute(&self, call: &HostCall) -> FanoutResult<HostOutcome> {
        let args = self.render_args(call);
        info!(
            job_id = %call.job_id,
            host = %call.host,
            "执行主机命令: {} {:?}",
            self.program,
            args
        );

        let output = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| FanoutError::transport(format!("启动命令 {} 失败: {e}", self.program)))?;

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

        if output.status.success() {
            return Ok(HostOutcome {
                error_number: 0,
                result: (!stdout.is_empty()).then_some(stdout),
            });
        }

        // 被信号终止时没有退出码
        let error_number = output.status.code().unwrap_or(-1);
        let detail = if !stderr.is_empty() {
            stderr
        } else if !stdout.is_empty() {
            stdout
        } else {
            format!("命令执行失败，退出码: {error_number}")
        };
        Ok(HostOutcome::failed(error_number, detail))
    }

    fn name(&self) -> &'static str {
        "command"
    }
}
