//! 测试数据构造器

use std::sync::Arc;

use fanout_core::{ActivityRegistry, DispatcherConfig, RegistryConfig};
use fanout_dispatcher::{DispatchEngine, HostTransport};
use fanout_domain::HostList;

/// 测试中使用的本机主机名
pub const TEST_LOCAL_HOST: &str = "local";

pub fn hosts(names: &[&str]) -> HostList {
    HostList::from_names(names.iter().copied())
}

/// `host-0` 到 `host-{count-1}`
pub fn numbered_hosts(count: usize) -> HostList {
    HostList::from_names((0..count).map(|i| format!("host-{i}")))
}

/// 引擎及其注册表的构造器
pub struct EngineBuilder {
    registry_config: RegistryConfig,
    dispatcher_config: DispatcherConfig,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self {
            registry_config: RegistryConfig::default(),
            dispatcher_config: DispatcherConfig {
                local_hostname: Some(TEST_LOCAL_HOST.to_string()),
                ..DispatcherConfig::default()
            },
        }
    }

    pub fn with_max_activities(mut self, max_activities: usize) -> Self {
        self.registry_config.max_activities = max_activities;
        self
    }

    pub fn with_max_concurrent_calls(mut self, max_concurrent_calls: usize) -> Self {
        self.dispatcher_config.max_concurrent_calls = max_concurrent_calls;
        self
    }

    pub fn build(self, transport: Arc<dyn HostTransport>) -> (Arc<ActivityRegistry>, DispatchEngine) {
        let registry = Arc::new(ActivityRegistry::new(self.registry_config));
        let engine = DispatchEngine::new(Arc::clone(&registry), transport, &self.dispatcher_config);
        (registry, engine)
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
