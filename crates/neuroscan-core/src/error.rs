//! 错误定义模块

use thiserror::Error;

/// 看板系统统一错误类型
#[derive(Error, Debug)]
pub enum NeuroscanError {
    #[error("配置错误: {0}")]
    Config(String),

    #[error("数据库错误: {0}")]
    Database(String),

    /// 读取类操作失败（传输或鉴权问题）
    #[error("查询错误: {0}")]
    Query(String),

    /// 写入被拒绝，消息原样展示给用户
    #[error("验证错误: {0}")]
    Validation(String),

    #[error("未认证: {0}")]
    Unauthenticated(String),

    #[error("权限错误: {0}")]
    Permission(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("网络错误: {0}")]
    Network(String),

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("系统内部错误: {0}")]
    Internal(String),
}

impl NeuroscanError {
    /// 面向用户的消息文本（不带分类前缀）
    pub fn user_message(&self) -> String {
        match self {
            NeuroscanError::Config(msg)
            | NeuroscanError::Database(msg)
            | NeuroscanError::Query(msg)
            | NeuroscanError::Validation(msg)
            | NeuroscanError::Unauthenticated(msg)
            | NeuroscanError::Permission(msg)
            | NeuroscanError::NotFound(msg)
            | NeuroscanError::Network(msg)
            | NeuroscanError::Internal(msg) => msg.clone(),
            NeuroscanError::Serialization(e) => e.to_string(),
            NeuroscanError::Io(e) => e.to_string(),
        }
    }
}

#[cfg(feature = "database")]
impl From<sqlx::Error> for NeuroscanError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) => {
                // 23505 unique_violation, 23503 foreign_key_violation, 23502 not_null_violation
                match db_err.code().as_deref() {
                    Some("23505") | Some("23503") | Some("23502") | Some("23514") => {
                        NeuroscanError::Validation(db_err.message().to_string())
                    }
                    _ => NeuroscanError::Database(db_err.message().to_string()),
                }
            }
            sqlx::Error::RowNotFound => NeuroscanError::NotFound(err.to_string()),
            _ => NeuroscanError::Database(err.to_string()),
        }
    }
}

/// 看板系统统一结果类型
pub type Result<T> = std::result::Result<T, NeuroscanError>;
