use backup_core::config::AppConfig;
use backup_core::error::Result;
use backup_core::gdrive::GoogleDriveClient;
use backup_core::history::LogRecorder;
use backup_core::inventory::Inventory;
use backup_core::routeros::RouterOsConnector;
use backup_core::service::BackupService;
use backup_core::settings::SettingsStore;
use backup_core::transaction::BackupRunner;
use backup_core::error::BackupError;
use backup_core::transfer::FtpTransferConnector;
use std::path::Path;
use std::sync::Arc;

use crate::cli::Commands;
use crate::commands;

/// 生产环境的服务类型组合：RouterOS API + FTP 下载
pub type Service = BackupService<RouterOsConnector, FtpTransferConnector>;

pub struct CliApp {
    pub config: AppConfig,
    pub service: Arc<Service>,
}

impl std::fmt::Debug for CliApp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CliApp")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl CliApp {
    /// 初始化CLI应用：显式指定的配置文件优先，否则走智能配置查找
    pub async fn new_with_auto_config(config_path: Option<&Path>) -> Result<Self> {
        let config = match config_path {
            Some(path) => {
                if !path.exists() {
                    return Err(BackupError::custom(format!(
                        "配置文件不存在: {}",
                        path.display()
                    )));
                }
                AppConfig::load_from_file(path)?
            }
            None => AppConfig::find_and_load_config()?,
        };

        // 确保数据目录存在
        config.ensure_dirs()?;

        let runner = BackupRunner::new(
            RouterOsConnector::default(),
            FtpTransferConnector::default(),
            config.backup_dir(),
        );
        let cloud = Arc::new(GoogleDriveClient::new(config.token_file()));
        let service = BackupService::new(
            runner,
            Inventory::new(config.routers_file()),
            SettingsStore::new(config.settings_file()),
            cloud,
            LogRecorder::new(config.log_file()),
        );

        Ok(Self {
            config,
            service: Arc::new(service),
        })
    }

    /// 运行应用命令
    pub async fn run_command(&self, command: Commands) -> Result<()> {
        match command {
            Commands::Init { .. } => unreachable!(), // 已经在 main.rs 中处理
            Commands::Backup { router_id } => commands::run_backup(self, router_id).await,
            Commands::Test { router_id } => commands::run_test(self, &router_id).await,
            Commands::History { limit } => commands::run_history(self, limit).await,
            Commands::Run => commands::run_daemon(self).await,
        }
    }
}
