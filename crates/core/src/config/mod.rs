//! 配置管理
//!
//! 配置加载顺序：默认值 → TOML 配置文件 → `FANOUT_` 前缀的环境变量（配置段与字段之间用 `__` 分隔）。
//! 各配置段都带有 `validate()`，加载后统一校验。

pub mod models;

pub use models::{
    AppConfig, DispatcherConfig, ExecutorKind, RegistryConfig, RetentionConfig, WorkerConfig,
    MAX_COMPLETED_JOB_TTL_SECONDS,
};
