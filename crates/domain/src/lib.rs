pub mod entities;
pub mod host_list;
pub mod value_objects;

pub use entities::*;
pub use host_list::{normalize_host_list, HostList, NormalizedHosts};
pub use value_objects::*;
pub use fanout_errors::{FanoutError, FanoutResult};
