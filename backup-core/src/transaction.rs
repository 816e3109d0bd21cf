//! 单台设备的备份事务
//!
//! 一次事务：连接 -> 导出 -> 二进制快照 -> 等待写盘 -> 下载 -> 远端清理 -> 断开。
//! 任何失败都转换为结果字段，绝不向调用方抛错。

use crate::constants::routeros as consts;
use crate::device::{DeviceConnector, DeviceSession, TransferConnector, TransferSession};
use crate::error::Result;
use crate::model::{BackupOutcome, DeviceTarget};
use chrono::Utc;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, warn};

/// 备份事务执行器，管理协议与传输协议的编排者
pub struct BackupRunner<D, T> {
    device: D,
    transfer: T,
    backup_dir: PathBuf,
    settle_delay: Duration,
    #[cfg(test)]
    fixed_time: Option<chrono::DateTime<Utc>>,
}

impl<D, T> BackupRunner<D, T>
where
    D: DeviceConnector,
    T: TransferConnector,
{
    pub fn new(device: D, transfer: T, backup_dir: PathBuf) -> Self {
        Self {
            device,
            transfer,
            backup_dir,
            settle_delay: consts::SETTLE_DELAY,
            #[cfg(test)]
            fixed_time: None,
        }
    }

    /// 覆盖默认的写盘等待时间
    pub fn with_settle_delay(mut self, settle_delay: Duration) -> Self {
        self.settle_delay = settle_delay;
        self
    }

    fn timestamp(&self) -> String {
        #[cfg(test)]
        if let Some(t) = self.fixed_time {
            return t.format(consts::TIMESTAMP_FORMAT).to_string();
        }
        Utc::now().format(consts::TIMESTAMP_FORMAT).to_string()
    }

    /// 执行一次备份事务，失败全部落到结果字段里
    pub async fn run(&self, target: &DeviceTarget) -> BackupOutcome {
        let mut session = match self.device.connect(target).await {
            Ok(session) => session,
            Err(e) => {
                return BackupOutcome::failure(target, format!("Backup failed: {e}"));
            }
        };

        let outcome = self.run_with_session(&mut session, target).await;

        // 不论走到哪一步，管理会话都要关闭
        session.close().await;
        outcome
    }

    async fn run_with_session(
        &self,
        session: &mut D::Session,
        target: &DeviceTarget,
    ) -> BackupOutcome {
        // 设备自报名称作为文件名前缀，查询失败时退回配置名，保证非空
        let identity = match session.identity().await {
            Ok(name) if !name.is_empty() => name,
            Ok(_) | Err(_) => target.display_name(),
        };

        let stem = format!("{identity}-{}", self.timestamp());

        if let Err(e) = self.export_with_fallback(session, &stem).await {
            return BackupOutcome::failure(target, format!("Backup failed: {e}"));
        }

        if let Err(e) = session.save_snapshot(&stem).await {
            return BackupOutcome::failure(target, format!("Backup failed: {e}"));
        }

        // 设备异步写文件，固定等待而不是轮询
        tokio::time::sleep(self.settle_delay).await;

        if let Err(e) = tokio::fs::create_dir_all(&self.backup_dir).await {
            return BackupOutcome::failure(target, format!("Backup failed: {e}"));
        }

        let remote_names = [format!("{stem}.rsc"), format!("{stem}.backup")];

        let mut xfer = match self.transfer.connect(target).await {
            Ok(xfer) => xfer,
            Err(e) => {
                return BackupOutcome::failure(target, format!("Backup failed: {e}"));
            }
        };

        // 两个文件独立下载，单个失败只是警告，不作废另一个
        let mut local_files = Vec::new();
        for remote_name in &remote_names {
            let local_path = self.backup_dir.join(remote_name);
            match xfer.download(remote_name, &local_path).await {
                Ok(()) => local_files.push(local_path),
                Err(e) => {
                    warn!("无法下载 {}: {}", remote_name, e);
                }
            }
        }

        // 评估结果之前先关掉传输会话
        xfer.close().await;

        // 远端清理是尽力而为，失败不影响事务成败
        if let Err(e) = Self::remove_remote_artifacts(session, &remote_names).await {
            debug!("远端备份文件清理失败（忽略）: {}", e);
        }

        if local_files.is_empty() {
            return BackupOutcome::failure(
                target,
                "Backup failed: Could not download any backup files".to_string(),
            );
        }

        let names: Vec<String> = local_files
            .iter()
            .filter_map(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .collect();
        BackupOutcome::success(
            target,
            format!("Backup created: {}", names.join(", ")),
            local_files,
        )
    }

    /// 连接测试：建立会话并查询 identity，成败都转换为提示消息
    pub async fn test_connection(&self, target: &DeviceTarget) -> (bool, String) {
        match self.device.connect(target).await {
            Ok(mut session) => {
                let result = session.identity().await;
                session.close().await;
                match result {
                    Ok(identity) => (true, format!("Connected successfully to '{identity}'")),
                    Err(e) => (false, format!("Connection failed: {e}")),
                }
            }
            Err(e) => (false, format!("Connection failed: {e}")),
        }
    }

    /// 先带 show-sensitive 导出，设备不认识该参数时降级重试一次
    async fn export_with_fallback(&self, session: &mut D::Session, stem: &str) -> Result<()> {
        match session.export_config(stem, true).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_unsupported_option() => session.export_config(stem, false).await,
            Err(e) => Err(e),
        }
    }

    async fn remove_remote_artifacts(
        session: &mut D::Session,
        remote_names: &[String],
    ) -> Result<()> {
        let files = session.list_files().await?;
        for file in files {
            if remote_names.contains(&file.name) {
                session.remove_file(&file.id).await?;
            }
        }
        Ok(())
    }
}
