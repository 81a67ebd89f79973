//! 分发作业的本地执行端
//!
//! `LocalTransport` 实现分发层的传输边界，把每个主机调用交给一个
//! `HostExecutor` 在本进程内执行。

pub mod executor_factory;
pub mod executors;
pub mod local_transport;

#[cfg(test)]
mod executors_test;

pub use executor_factory::build_executor;
pub use executors::{CommandExecutor, DryRunExecutor, HostExecutor, HostOutcome};
pub use local_transport::LocalTransport;
