use thiserror::Error;

/// 主机调用返回的错误号: 传输层无法发出请求
pub const TRANSPORT_ERROR: i32 = 30_801;
/// 主机调用返回的错误号: 调用超时，由调用层合成
pub const HOST_CALL_TIMED_OUT: i32 = 30_802;
/// 主机调用返回的错误号: 作业被取消时调用仍未完成
pub const HOST_CALL_CANCELED: i32 = 30_803;
/// post-phase 失败但未给出错误号时使用
pub const POST_PHASE_FAILED: i32 = 30_804;

#[derive(Debug, Error)]
pub enum FanoutError {
    #[error("活动不存在: {job_id}")]
    NoSuchActivity { job_id: String },
    #[error("作业 {job_id} 的主机索引无效: {host_index} (主机数 {host_count})")]
    InvalidHostIdInResponse {
        job_id: String,
        host_index: usize,
        host_count: usize,
    },
    #[error("作业 {job_id} 的主机 {host_index} 已经响应过")]
    HostAlreadyResponded { job_id: String, host_index: usize },
    #[error("资源不足: {0}")]
    ResourceExhausted(String),
    #[error("无效的匹配模式: {pattern} - {message}")]
    InvalidPattern { pattern: String, message: String },
    #[error("未知的集群操作: {0}")]
    UnknownOperation(String),
    #[error("传输错误: {0}")]
    Transport(String),
    #[error("配置错误: {0}")]
    Configuration(String),
    #[error("序列化错误: {0}")]
    Serialization(String),
    #[error("操作超时: {0}")]
    Timeout(String),
    #[error("内部错误: {0}")]
    Internal(String),
}

pub type FanoutResult<T> = Result<T, FanoutError>;

impl FanoutError {
    pub fn no_such_activity<S: Into<String>>(job_id: S) -> Self {
        Self::NoSuchActivity {
            job_id: job_id.into(),
        }
    }
    pub fn invalid_host_index<S: Into<String>>(job_id: S, host_index: usize, host_count: usize) -> Self {
        Self::InvalidHostIdInResponse {
            job_id: job_id.into(),
            host_index,
            host_count,
        }
    }
    pub fn transport<S: Into<String>>(msg: S) -> Self {
        Self::Transport(msg.into())
    }
    pub fn config_error<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }
    /// 调用方用法错误，应立即返回给调用方而不是记录到作业中
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            FanoutError::NoSuchActivity { .. }
                | FanoutError::InvalidHostIdInResponse { .. }
                | FanoutError::HostAlreadyResponded { .. }
                | FanoutError::InvalidPattern { .. }
                | FanoutError::UnknownOperation(_)
        )
    }
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FanoutError::Transport(_) | FanoutError::Timeout(_) | FanoutError::ResourceExhausted(_)
        )
    }
    /// 稳定的数字错误码，用于状态输出
    pub fn code(&self) -> i32 {
        match self {
            FanoutError::NoSuchActivity { .. } => 30_001,
            FanoutError::InvalidHostIdInResponse { .. } => 30_002,
            FanoutError::HostAlreadyResponded { .. } => 30_003,
            FanoutError::ResourceExhausted(_) => 30_004,
            FanoutError::InvalidPattern { .. } => 30_005,
            FanoutError::UnknownOperation(_) => 30_006,
            FanoutError::Transport(_) => TRANSPORT_ERROR,
            FanoutError::Timeout(_) => HOST_CALL_TIMED_OUT,
            FanoutError::Configuration(_) => 30_010,
            FanoutError::Serialization(_) => 30_011,
            FanoutError::Internal(_) => 30_099,
        }
    }
}

impl From<serde_json::Error> for FanoutError {
    fn from(err: serde_json::Error) -> Self {
        FanoutError::Serialization(err.to_string())
    }
}

impl From<anyhow::Error> for FanoutError {
    fn from(err: anyhow::Error) -> Self {
        FanoutError::Internal(err.to_string())
    }
}
