use fanout_core::config::*;
use fanout_core::{LogLevel, OutputFormat};
use std::env;
use std::io::Write;
use tempfile::NamedTempFile;

#[test]
fn test_default_config() {
    let config = AppConfig::default();
    assert!(config.validate().is_ok());

    assert_eq!(config.registry.max_activities, 4096);
    assert_eq!(config.dispatcher.max_concurrent_calls, 256);
    assert_eq!(config.worker.executor, ExecutorKind::DryRun);
    assert!(!config.retention.enabled);
    assert_eq!(config.logging.level, LogLevel::Info);
}

#[test]
fn test_config_from_toml() {
    let toml_content = r#"
[registry]
max_activities = 64
tombstone_capacity = 16
tombstone_ttl_seconds = 30

[dispatcher]
local_hostname = "mds-1"
max_concurrent_calls = 32
default_list_limit = 10

[worker]
host_call_timeout_seconds = 120
executor = "command"
command_program = "/opt/fsmgmt/bin/agent"
command_args = ["--host", "{host}", "--op", "{op}"]

[retention]
enabled = true
completed_job_ttl_seconds = 900
sweep_interval_seconds = 30

[logging]
level = "debug"
format = "json"
"#;

    let config = AppConfig::from_toml(toml_content).unwrap();
    assert_eq!(config.registry.max_activities, 64);
    assert_eq!(config.dispatcher.resolve_local_hostname(), "mds-1");
    assert_eq!(config.worker.executor, ExecutorKind::Command);
    assert_eq!(config.worker.command_args.len(), 4);
    assert!(config.retention.enabled);
    assert_eq!(config.logging.level, LogLevel::Debug);
    assert_eq!(config.logging.format, OutputFormat::Json);
}

#[test]
fn test_partial_toml_uses_defaults() {
    let config = AppConfig::from_toml("[dispatcher]\nmax_concurrent_calls = 8\n").unwrap();
    assert_eq!(config.dispatcher.max_concurrent_calls, 8);
    assert_eq!(config.dispatcher.default_list_limit, 100);
    assert_eq!(config.registry.tombstone_capacity, 1024);
}

#[test]
fn test_invalid_config_is_rejected() {
    assert!(AppConfig::from_toml("[registry]\nmax_activities = 0\n").is_err());
    assert!(AppConfig::from_toml("[dispatcher]\nmax_concurrent_calls = 0\n").is_err());
    assert!(AppConfig::from_toml("[worker]\nexecutor = \"command\"\n").is_err());
    assert!(
        AppConfig::from_toml("[retention]\nenabled = true\nsweep_interval_seconds = 0\n").is_err()
    );
    assert!(AppConfig::from_toml("[dispatcher]\nlocal_hostname = \"  \"\n").is_err());
}

#[test]
fn test_completed_job_ttl_is_capped() {
    assert!(AppConfig::from_toml(
        "[retention]\nenabled = true\ncompleted_job_ttl_seconds = 18446744073709551615\n"
    )
    .is_err());
    assert!(AppConfig::from_toml(&format!(
        "[retention]\ncompleted_job_ttl_seconds = {}\n",
        MAX_COMPLETED_JOB_TTL_SECONDS + 1
    ))
    .is_err());

    let config = AppConfig::from_toml(&format!(
        "[retention]\nenabled = true\ncompleted_job_ttl_seconds = {}\n",
        MAX_COMPLETED_JOB_TTL_SECONDS
    ))
    .unwrap();
    assert_eq!(
        config.retention.completed_job_ttl_seconds,
        MAX_COMPLETED_JOB_TTL_SECONDS
    );
}

#[test]
fn test_toml_round_trip() {
    let mut config = AppConfig::default();
    config.dispatcher.local_hostname = Some("mds-0".to_string());
    let rendered = config.to_toml().unwrap();
    let parsed = AppConfig::from_toml(&rendered).unwrap();
    assert_eq!(parsed.dispatcher.local_hostname.as_deref(), Some("mds-0"));
    assert_eq!(parsed.registry.max_activities, config.registry.max_activities);
}

#[test]
fn test_load_from_file_and_env_override() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        "[dispatcher]\nlocal_hostname = \"mds-file\"\nmax_concurrent_calls = 16\n"
    )
    .unwrap();
    let path = file.path().to_str().unwrap().to_string();

    env::set_var("FANOUT_REGISTRY__MAX_ACTIVITIES", "77");
    let config = AppConfig::load(Some(&path));
    env::remove_var("FANOUT_REGISTRY__MAX_ACTIVITIES");

    let config = config.unwrap();
    assert_eq!(config.dispatcher.local_hostname.as_deref(), Some("mds-file"));
    assert_eq!(config.dispatcher.max_concurrent_calls, 16);
    assert_eq!(config.registry.max_activities, 77);
}

#[test]
fn test_load_missing_file_fails() {
    let result = AppConfig::load(Some("/nonexistent/fanout.toml"));
    assert!(result.is_err());
}

#[test]
fn test_log_level_parse() {
    assert_eq!("WARNING".parse::<LogLevel>().unwrap(), LogLevel::Warn);
    assert!("loud".parse::<LogLevel>().is_err());
    assert_eq!("compact".parse::<OutputFormat>().unwrap(), OutputFormat::Compact);
}
