/// RouterOS 设备相关常量
pub mod routeros {
    use std::time::Duration;

    /// RouterOS API 默认端口
    pub const DEFAULT_API_PORT: u16 = 8728;

    /// RouterOS FTP 默认端口
    pub const DEFAULT_FTP_PORT: u16 = 21;

    /// API 连接超时
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

    /// FTP 连接超时
    pub const TRANSFER_TIMEOUT: Duration = Duration::from_secs(30);

    /// 设备异步写盘的固定等待时间（不做轮询）
    pub const SETTLE_DELAY: Duration = Duration::from_secs(5);

    /// 备份文件名时间戳格式（UTC，可排序，秒级精度）
    pub const TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";
}

/// 云端保留策略相关常量
pub mod retention {
    /// 手动触发时每台设备保留的云端备份数
    pub const KEEP_LATEST_MANUAL: usize = 2;

    /// 定时触发时每台设备保留的云端备份数
    pub const KEEP_LATEST_SCHEDULED: usize = 12;
}

/// 备份历史记录相关常量
pub mod history {
    /// 历史记录上限，超过后丢弃最旧的条目
    pub const MAX_LOG_ENTRIES: usize = 100;
}

/// 定时任务相关常量
pub mod scheduler {
    /// 全量备份任务的固定标识，同一时刻最多存在一个
    pub const JOB_ID: &str = "backup_all_routers";
}

/// Google Drive API 相关常量
pub mod gdrive {
    /// 文件元数据端点
    pub const FILES_URL: &str = "https://www.googleapis.com/drive/v3/files";

    /// 文件内容上传端点
    pub const UPLOAD_URL: &str = "https://www.googleapis.com/upload/drive/v3/files";

    /// 默认的 OAuth2 token 刷新端点
    pub const DEFAULT_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

    /// 环境变量形式的 token（部署时优先于文件）
    pub const TOKEN_ENV: &str = "GOOGLE_TOKEN";

    /// 凭据目录下的 token 文件名
    pub const TOKEN_FILE_NAME: &str = "token.json";

    /// access token 过期判定的提前量（秒）
    pub const TOKEN_EXPIRY_MARGIN_SECS: i64 = 60;
}
