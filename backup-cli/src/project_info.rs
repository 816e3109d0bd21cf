//! Backup CLI 项目信息模块
//!
//! backup-cli 是面向用户的主程序，项目元数据统一在这里定义，
//! backup-core 作为内部库只提供技术性常量

/// 项目元数据（自动从 Cargo.toml 同步）
pub mod metadata {
    /// 项目名称
    pub const PROJECT_NAME: &str = env!("CARGO_PKG_NAME");

    /// 项目描述
    pub const PROJECT_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

    /// 项目作者
    pub const PROJECT_AUTHORS: &str = env!("CARGO_PKG_AUTHORS");

    /// 用户友好的显示名称（手动维护，用于 UI 显示）
    pub mod display {
        /// CLI 工具的完整名称
        pub const CLI_FULL_NAME: &str = "MikroTik Backup CLI";

        /// 项目详细描述
        pub const DESCRIPTION_LONG: &str =
            "自动化的 MikroTik RouterOS 配置备份工具，支持手动与定时备份、Google Drive 云端归档与保留清理";
    }
}

/// 版本信息
pub mod version_info {
    /// CLI 版本（自动从 Cargo.toml 同步）
    pub const CLI_VERSION: &str = env!("CARGO_PKG_VERSION");
}

/// 获取版本信息字符串
pub fn get_version_string() -> String {
    format!(
        "{} v{}",
        metadata::display::CLI_FULL_NAME,
        version_info::CLI_VERSION
    )
}
