//! 集群操作的扇出/扇入分发层
//!
//! `DispatchEngine` 把一个目录化的集群操作同时下发到多个主机，逐主机记录结果，
//! 并在最后一个主机响应后恰好执行一次收尾（可选的后置阶段）。每个分发作业都是
//! 活动注册表中的一个条目，因此可以被列出、查询和取消。

pub mod controller;
pub mod engine;
pub mod job;
pub mod post_phase;
pub mod retention;
pub mod transport;

pub use controller::DispatchController;
pub use engine::DispatchEngine;
pub use job::DispatchJob;
pub use post_phase::{FnPostPhase, PostPhase, PostPhaseFailure, RequireAllHostsSucceeded};
pub use retention::{RetentionSweeper, SweepStats};
pub use transport::{HostCall, HostCallbacks, HostTransport};
