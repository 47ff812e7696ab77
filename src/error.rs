use thiserror::Error;

pub type Result<T> = std::result::Result<T, SplunkSearchError>;

#[derive(Debug, Error)]
pub enum SplunkSearchError {
    #[error("配置错误: {0}")]
    ConfigError(String),

    #[error("连接失败: {url} - {reason}")]
    ConnectError { url: String, reason: String },

    #[error("认证失败: {0}")]
    AuthError(String),

    #[error("无效请求: {0}")]
    InvalidInput(String),

    #[error("Splunk 拒绝查询: status={status:?} {message}")]
    EngineHttp {
        status: Option<u16>,
        message: String,
    },

    #[error("响应解析错误: {0}")]
    ParseError(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
