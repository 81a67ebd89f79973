pub mod activity;
pub mod activity_registry;
pub mod config;
pub mod logging;

pub use activity::{Activity, ActivityContext, KillOutcome, RemovalReason};
pub use activity_registry::ActivityRegistry;
pub use config::{
    AppConfig, DispatcherConfig, ExecutorKind, RegistryConfig, RetentionConfig, WorkerConfig,
};
pub use logging::{init_logging, LogConfig, LogLevel, OutputFormat};

pub use fanout_errors::{FanoutError, FanoutResult};
