use std::fmt;
use std::str::FromStr;

use fanout_errors::FanoutError;
use serde::{Deserialize, Serialize};

/// 作业ID，由注册表在创建时根据单调递增计数器生成
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn from_sequence(sequence: u64) -> Self {
        Self(sequence.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for JobId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// 可以分发到集群各主机的操作目录
///
/// 每个取值隐含一种 `args` 结构，只有远端执行者理解，分发层不解析。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterOperation {
    MountFs,
    UnmountFs,
    ChangeMountOptions,
    /// 在客户端上创建共享文件系统（添加客户端）
    CreateSharedFs,
    GrowFs,
    RemoveFs,
    SetAdvancedNetConfig,
}

impl ClusterOperation {
    pub const ALL: [ClusterOperation; 7] = [
        ClusterOperation::MountFs,
        ClusterOperation::UnmountFs,
        ClusterOperation::ChangeMountOptions,
        ClusterOperation::CreateSharedFs,
        ClusterOperation::GrowFs,
        ClusterOperation::RemoveFs,
        ClusterOperation::SetAdvancedNetConfig,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ClusterOperation::MountFs => "mount_fs",
            ClusterOperation::UnmountFs => "unmount_fs",
            ClusterOperation::ChangeMountOptions => "change_mount_options",
            ClusterOperation::CreateSharedFs => "create_shared_fs",
            ClusterOperation::GrowFs => "grow_fs",
            ClusterOperation::RemoveFs => "remove_fs",
            ClusterOperation::SetAdvancedNetConfig => "set_advanced_net_config",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ClusterOperation::MountFs => "挂载共享文件系统",
            ClusterOperation::UnmountFs => "卸载共享文件系统",
            ClusterOperation::ChangeMountOptions => "修改挂载选项",
            ClusterOperation::CreateSharedFs => "在客户端上创建共享文件系统",
            ClusterOperation::GrowFs => "扩容文件系统",
            ClusterOperation::RemoveFs => "删除文件系统",
            ClusterOperation::SetAdvancedNetConfig => "设置高级网络配置",
        }
    }
}

impl fmt::Display for ClusterOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClusterOperation {
    type Err = FanoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        ClusterOperation::ALL
            .iter()
            .copied()
            .find(|op| op.as_str() == normalized)
            .ok_or_else(|| FanoutError::UnknownOperation(s.to_string()))
    }
}

/// 注册表中活动的类型标签
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    /// 多主机分发作业
    Dispatch,
    /// 由进程或线程承载的后台活动
    Background,
}

impl fmt::Display for ActivityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActivityType::Dispatch => f.write_str("dispatch"),
            ActivityType::Background => f.write_str("background"),
        }
    }
}
