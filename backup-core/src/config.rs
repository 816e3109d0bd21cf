use crate::constants::gdrive;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// 应用配置结构
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub storage: StorageConfig,
}

/// 存储路径相关配置
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StorageConfig {
    /// 清单、设置、历史记录等 JSON 文件所在目录
    pub data_dir: String,
    /// 下载到本地的备份文件目录
    pub backup_dir: String,
    /// Google Drive 凭据目录
    pub credentials_dir: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig {
                data_dir: "data".to_string(),
                backup_dir: "backups".to_string(),
                credentials_dir: "credentials".to_string(),
            },
        }
    }
}

impl AppConfig {
    /// 智能查找并加载配置文件
    /// 按优先级查找：config.toml -> mikrotik-backup.toml -> .mikrotik-backup.toml
    pub fn find_and_load_config() -> Result<Self> {
        let config_files = [
            "config.toml",
            "mikrotik-backup.toml",
            ".mikrotik-backup.toml",
        ];

        for config_file in &config_files {
            if Path::new(config_file).exists() {
                tracing::info!("找到配置文件: {}", config_file);
                return Self::load_from_file(config_file);
            }
        }

        // 如果没找到配置文件，创建默认配置
        tracing::warn!("未找到配置文件，创建默认配置: config.toml");
        let default_config = Self::default();
        default_config.save_to_file("config.toml")?;
        Ok(default_config)
    }

    /// 从指定文件加载配置
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)?;
        let config: AppConfig = toml::from_str(&content)?;

        Ok(config)
    }

    /// 保存配置到文件
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(&path, content)?;
        Ok(())
    }

    /// 确保数据、备份、凭据目录存在
    pub fn ensure_dirs(&self) -> Result<()> {
        fs::create_dir_all(&self.storage.data_dir)?;
        fs::create_dir_all(&self.storage.backup_dir)?;
        fs::create_dir_all(&self.storage.credentials_dir)?;
        Ok(())
    }

    /// 获取本地备份目录路径
    pub fn backup_dir(&self) -> PathBuf {
        PathBuf::from(&self.storage.backup_dir)
    }

    /// 路由器清单文件路径
    pub fn routers_file(&self) -> PathBuf {
        PathBuf::from(&self.storage.data_dir).join("routers.json")
    }

    /// 设置文件路径
    pub fn settings_file(&self) -> PathBuf {
        PathBuf::from(&self.storage.data_dir).join("settings.json")
    }

    /// 备份历史记录文件路径
    pub fn log_file(&self) -> PathBuf {
        PathBuf::from(&self.storage.data_dir).join("backup_log.json")
    }

    /// Google Drive token 文件路径
    pub fn token_file(&self) -> PathBuf {
        PathBuf::from(&self.storage.credentials_dir).join(gdrive::TOKEN_FILE_NAME)
    }
}
