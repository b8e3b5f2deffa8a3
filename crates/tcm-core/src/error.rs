//! 错误定义模块

use thiserror::Error;

/// 诊所系统统一错误类型
#[derive(Error, Debug)]
pub enum TcmError {
    #[error("配置错误: {0}")]
    Config(String),

    #[error("数据库错误: {0}")]
    Database(String),

    /// 写入失败，`raw_response` 保留本次AI分析的原始响应，避免信息丢失
    #[error("持久化失败: {message}")]
    Persistence {
        message: String,
        raw_response: Option<String>,
    },

    #[error("AI模型服务不可用: {0}")]
    UpstreamUnavailable(String),

    #[error("存储错误: {0}")]
    Storage(String),

    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("验证错误: {0}")]
    Validation(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("系统内部错误: {0}")]
    Internal(String),

    #[error("无效状态转换: 从 {from} 到 {event}")]
    InvalidStateTransition { from: String, event: String },
}

impl TcmError {
    /// 就诊记录不存在
    pub fn visit_not_found(visit_id: i64) -> Self {
        TcmError::NotFound(format!("Visit not found with id: {}", visit_id))
    }

    /// 构造持久化错误
    pub fn persistence(message: impl Into<String>, raw_response: Option<String>) -> Self {
        TcmError::Persistence {
            message: message.into(),
            raw_response,
        }
    }

    /// 持久化失败时保留下来的原始AI响应
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            TcmError::Persistence { raw_response, .. } => raw_response.as_deref(),
            _ => None,
        }
    }
}

#[cfg(feature = "database")]
impl From<sqlx::Error> for TcmError {
    fn from(e: sqlx::Error) -> Self {
        TcmError::Database(e.to_string())
    }
}

/// 诊所系统统一结果类型
pub type Result<T> = std::result::Result<T, TcmError>;
