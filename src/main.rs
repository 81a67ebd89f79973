use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use fanout::shutdown::wait_for_shutdown_signal;
use fanout::{Application, DispatchRequest, ShutdownManager, WaitOutcome};
use fanout_core::{init_logging, AppConfig, LogLevel, OutputFormat};
use fanout_domain::ClusterOperation;
use tracing::{error, info};

fn cli() -> Command {
    Command::new("fanout")
        .version(env!("CARGO_PKG_VERSION"))
        .about("共享文件系统集群操作分发")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("配置文件路径")
                .global(true),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("日志级别")
                .value_parser(["trace", "debug", "info", "warn", "error"])
                .global(true),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .value_name("FORMAT")
                .help("日志格式")
                .value_parser(["json", "pretty", "compact"])
                .global(true),
        )
        .subcommand(
            Command::new("dispatch")
                .about("向一组主机下发集群操作并等待结果")
                .arg(
                    Arg::new("op")
                        .long("op")
                        .value_name("OP")
                        .help("操作名称，见 `fanout ops`")
                        .required(true),
                )
                .arg(
                    Arg::new("hosts")
                        .long("hosts")
                        .value_name("HOSTS")
                        .help("逗号分隔的目标主机")
                        .value_delimiter(',')
                        .num_args(1..)
                        .required(true),
                )
                .arg(
                    Arg::new("args")
                        .long("args")
                        .value_name("JSON")
                        .help("操作参数（JSON）")
                        .default_value("{}"),
                )
                .arg(
                    Arg::new("wait-seconds")
                        .long("wait-seconds")
                        .value_name("SECONDS")
                        .help("等待作业结束的最长时间")
                        .value_parser(clap::value_parser!(u64))
                        .default_value("60"),
                ),
        )
        .subcommand(Command::new("ops").about("列出可下发的集群操作"))
}

fn load_config(matches: &ArgMatches) -> Result<AppConfig> {
    let config_path = matches.get_one::<String>("config");
    let mut config = AppConfig::load(config_path.map(String::as_str))
        .with_context(|| format!("加载配置失败: {config_path:?}"))?;

    if let Some(level) = matches.get_one::<String>("log-level") {
        config.logging.level = level.parse::<LogLevel>()?;
    }
    if let Some(format) = matches.get_one::<String>("log-format") {
        config.logging.format = format.parse::<OutputFormat>()?;
    }
    Ok(config)
}

fn parse_request(matches: &ArgMatches) -> Result<DispatchRequest> {
    let op = matches
        .get_one::<String>("op")
        .context("缺少 --op")?
        .parse::<ClusterOperation>()?;
    let hosts = matches
        .get_many::<String>("hosts")
        .context("缺少 --hosts")?
        .cloned()
        .collect();
    let args_json = matches
        .get_one::<String>("args")
        .map(String::as_str)
        .unwrap_or("{}");
    let args = serde_json::from_str(args_json).context("--args 不是合法的JSON")?;
    let wait_seconds = matches.get_one::<u64>("wait-seconds").copied().unwrap_or(60);

    Ok(DispatchRequest {
        op,
        hosts,
        args,
        wait: Duration::from_secs(wait_seconds),
    })
}

async fn run_dispatch(config: AppConfig, matches: &ArgMatches) -> Result<ExitCode> {
    let request = parse_request(matches)?;
    let app = Application::new(config)?;
    app.start().await?;

    let shutdown_manager = ShutdownManager::new();
    let shutdown_rx = shutdown_manager.subscribe().await;
    let signal_manager = shutdown_manager.clone();
    let signal_task = tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        signal_manager.shutdown().await;
    });

    let report = app.dispatch(request, shutdown_rx).await;
    signal_task.abort();
    app.shutdown().await?;
    let report = report?;

    println!("{}", serde_json::to_string_pretty(&report)?);

    let code = match report.outcome {
        WaitOutcome::Finished if report.is_success() => 0,
        WaitOutcome::Finished => 1,
        WaitOutcome::TimedOut | WaitOutcome::Interrupted => 2,
    };
    info!(job_id = %report.job.job_id, outcome = ?report.outcome, "分发结束");
    Ok(ExitCode::from(code))
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let matches = cli().get_matches();
    let config = load_config(&matches)?;
    init_logging(&config.logging)?;

    match matches.subcommand() {
        Some(("ops", _)) => {
            for op in ClusterOperation::ALL {
                println!("{:<24}{}", op.as_str(), op.description());
            }
            Ok(ExitCode::SUCCESS)
        }
        Some(("dispatch", sub_matches)) => run_dispatch(config, sub_matches)
            .await
            .inspect_err(|e| error!("分发失败: {e:#}")),
        _ => Err(anyhow::anyhow!("未知子命令")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        cli().debug_assert();
    }

    #[test]
    fn test_parse_dispatch_request() {
        let matches = cli().get_matches_from([
            "fanout",
            "dispatch",
            "--op",
            "mount-fs",
            "--hosts",
            "a,b,c",
            "--args",
            r#"{"fs":"qfs1"}"#,
            "--wait-seconds",
            "5",
        ]);
        let (_, sub_matches) = matches.subcommand().unwrap();
        let request = parse_request(sub_matches).unwrap();

        assert_eq!(request.op, ClusterOperation::MountFs);
        assert_eq!(request.hosts, vec!["a", "b", "c"]);
        assert_eq!(request.args["fs"], "qfs1");
        assert_eq!(request.wait, Duration::from_secs(5));
    }

    #[test]
    fn test_unknown_operation_is_rejected() {
        let matches = cli().get_matches_from(["fanout", "dispatch", "--op", "defrag", "--hosts", "a"]);
        let (_, sub_matches) = matches.subcommand().unwrap();
        assert!(parse_request(sub_matches).is_err());
    }
}
