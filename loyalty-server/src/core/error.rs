use thiserror::Error;

use crate::loyalty::LedgerError;
use crate::utils::AppError;

/// 服务器启动与运行错误
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("配置错误: {0}")]
    Config(String),

    #[error("数据库错误: {0}")]
    Database(#[from] AppError),

    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("内部服务器错误")]
    Internal(#[from] anyhow::Error),
}

impl From<LedgerError> for ServerError {
    fn from(err: LedgerError) -> Self {
        ServerError::Config(err.to_string())
    }
}

/// 服务器层 Result 类型别名
pub type Result<T> = std::result::Result<T, ServerError>;
