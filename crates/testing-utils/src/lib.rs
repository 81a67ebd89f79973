//! # Fanout Testing Utils
//!
//! 工作区各 crate 测试共用的替身和构造器。
//!
//! ```toml
//! [dev-dependencies]
//! fanout-testing-utils = { path = "../testing-utils" }
//! ```

pub mod builders;
pub mod helpers;
pub mod mocks;

pub use builders::*;
pub use helpers::*;
pub use mocks::*;
