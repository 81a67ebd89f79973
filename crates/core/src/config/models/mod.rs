pub mod app_config;
pub mod dispatcher_worker;
pub mod registry;
pub mod retention;

pub use app_config::AppConfig;
pub use dispatcher_worker::{DispatcherConfig, ExecutorKind, WorkerConfig};
pub use registry::RegistryConfig;
pub use retention::{RetentionConfig, MAX_COMPLETED_JOB_TTL_SECONDS};
