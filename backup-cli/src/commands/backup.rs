use crate::app::CliApp;
use backup_core::error::{BackupError, Result};
use backup_core::model::Trigger;
use tracing::{error, info};

/// 手动备份：指定 ID 备份单台，否则备份清单里的全部路由器
pub async fn run_backup(app: &CliApp, router_id: Option<String>) -> Result<()> {
    match router_id {
        Some(id) => {
            info!("🔄 开始备份路由器 {} ...", id);
            let outcome = app.service.backup_by_id(&id, Trigger::Manual).await?;

            if outcome.success {
                info!("✅ {}: {}", outcome.router_name, outcome.message);
                if let Some(files) = &outcome.drive_files {
                    info!("☁️  已上传 {} 个文件到 Google Drive", files.len());
                }
                if let Some(errors) = &outcome.drive_errors {
                    for e in errors {
                        error!("⚠️  云端上传失败: {}", e);
                    }
                }
                Ok(())
            } else {
                error!("❌ {}: {}", outcome.router_name, outcome.message);
                Err(BackupError::custom(outcome.message))
            }
        }
        None => {
            info!("🔄 开始备份全部路由器...");
            let outcomes = app.service.backup_all(Trigger::ManualAll).await;
            if outcomes.is_empty() {
                info!("清单为空，请先编辑 {}", app.config.routers_file().display());
                return Ok(());
            }

            let ok = outcomes.iter().filter(|o| o.success).count();
            let failed = outcomes.len() - ok;
            info!("📊 备份完成: {} 成功, {} 失败", ok, failed);

            if failed > 0 {
                Err(BackupError::custom(format!("{failed} 台路由器备份失败")))
            } else {
                Ok(())
            }
        }
    }
}
