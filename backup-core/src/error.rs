use thiserror::Error;

pub type Result<T> = std::result::Result<T, BackupError>;

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("配置错误: {0}")]
    Config(#[from] toml::de::Error),

    #[error("配置序列化错误: {0}")]
    ConfigSer(#[from] toml::ser::Error),

    #[error("连接失败: {0}")]
    Connection(String),

    #[error("认证失败: {0}")]
    Auth(String),

    #[error("设备命令执行失败: {0}")]
    Command(String),

    #[error("文件传输失败: {0}")]
    Transfer(String),

    #[error("云端存储错误: {0}")]
    Cloud(String),

    #[error("Google Drive 未授权")]
    NotAuthorized,

    #[error("HTTP 请求错误: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("序列化错误: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("任务执行错误: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("路由器不存在: {0}")]
    RouterNotFound(String),

    #[error("自定义错误: {0}")]
    Custom(String),
}

// FTP 客户端错误统一归入传输错误
impl From<suppaftp::FtpError> for BackupError {
    fn from(err: suppaftp::FtpError) -> Self {
        BackupError::Transfer(err.to_string())
    }
}

impl BackupError {
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    pub fn command(msg: impl Into<String>) -> Self {
        Self::Command(msg.into())
    }

    pub fn transfer(msg: impl Into<String>) -> Self {
        Self::Transfer(msg.into())
    }

    pub fn cloud(msg: impl Into<String>) -> Self {
        Self::Cloud(msg.into())
    }

    pub fn custom(msg: impl Into<String>) -> Self {
        Self::Custom(msg.into())
    }

    /// 老版本 RouterOS 不认识 `show-sensitive` 参数时，
    /// 设备会返回包含 "unknown parameter" 的 trap 消息
    pub fn is_unsupported_option(&self) -> bool {
        match self {
            Self::Command(msg) => msg.to_lowercase().contains("unknown parameter"),
            _ => false,
        }
    }
}
