pub mod app;
pub mod shutdown;

pub use app::{Application, DispatchReport, DispatchRequest, WaitOutcome};
pub use shutdown::ShutdownManager;
