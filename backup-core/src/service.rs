//! 全量备份管道
//!
//! 手动触发和定时触发走同一条管道：逐台设备执行备份事务，
//! 成功结果经云端上传与保留清理，所有结果一律写入历史记录。
//! 设备串行处理，单台失败不影响其余设备

use crate::cloud::CloudStore;
use crate::device::{DeviceConnector, TransferConnector};
use crate::error::Result;
use crate::history::LogRecorder;
use crate::inventory::Inventory;
use crate::model::{BackupOutcome, DeviceTarget, Trigger};
use crate::retention::RetentionUploader;
use crate::settings::SettingsStore;
use crate::transaction::BackupRunner;
use std::sync::Arc;
use tracing::{error, info, warn};

/// 备份服务：启动时显式构造一次，之后按句柄共享
pub struct BackupService<D, T> {
    runner: BackupRunner<D, T>,
    inventory: Inventory,
    settings: SettingsStore,
    cloud: Arc<dyn CloudStore>,
    recorder: LogRecorder,
}

impl<D, T> BackupService<D, T>
where
    D: DeviceConnector,
    T: TransferConnector,
{
    pub fn new(
        runner: BackupRunner<D, T>,
        inventory: Inventory,
        settings: SettingsStore,
        cloud: Arc<dyn CloudStore>,
        recorder: LogRecorder,
    ) -> Self {
        Self {
            runner,
            inventory,
            settings,
            cloud,
            recorder,
        }
    }

    pub fn recorder(&self) -> &LogRecorder {
        &self.recorder
    }

    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    /// 备份一台设备并记录结果；上传失败不改变备份本身的成败
    pub async fn backup_device(&self, target: &DeviceTarget, trigger: Trigger) -> BackupOutcome {
        let settings = self.settings.load().unwrap_or_default();

        let mut outcome = self.runner.run(target).await;
        outcome.triggered_by = trigger;

        if outcome.success && !outcome.local_files.is_empty() && self.cloud.is_authorized().await {
            let uploader = RetentionUploader::new(self.cloud.clone());
            let report = uploader
                .process(
                    &outcome.local_files,
                    settings.folder_id(),
                    settings.delete_local_after_upload,
                    trigger.keep_latest(),
                )
                .await;

            if !report.drive_files.is_empty() {
                outcome.drive_files = Some(report.drive_files);
            }
            if !report.drive_errors.is_empty() {
                outcome.drive_errors = Some(report.drive_errors);
            }
            if report.local_deleted {
                outcome.local_deleted = Some(true);
            }
        }

        if let Err(e) = self.recorder.append(&outcome).await {
            error!("历史记录写入失败: {}", e);
        }
        outcome
    }

    /// 按 ID 备份一台清单里的设备
    pub async fn backup_by_id(&self, router_id: &str, trigger: Trigger) -> Result<BackupOutcome> {
        let target = self.inventory.find(router_id)?;
        Ok(self.backup_device(&target, trigger).await)
    }

    /// 对清单里的每台设备跑一遍管道
    pub async fn backup_all(&self, trigger: Trigger) -> Vec<BackupOutcome> {
        let routers = match self.inventory.load() {
            Ok(routers) => routers,
            Err(e) => {
                error!("清单读取失败: {}", e);
                return Vec::new();
            }
        };
        if routers.is_empty() {
            warn!("清单为空，没有可备份的设备");
            return Vec::new();
        }

        let mut outcomes = Vec::with_capacity(routers.len());
        for router in &routers {
            info!("开始备份 {}", router.display_name());
            let outcome = self.backup_device(router, trigger).await;
            if outcome.success {
                info!("{}: {}", router.display_name(), outcome.message);
            } else {
                warn!("{}: {}", router.display_name(), outcome.message);
            }
            outcomes.push(outcome);
        }
        outcomes
    }

    /// 连接测试
    pub async fn test_connection(&self, router_id: &str) -> Result<(bool, String)> {
        let target: DeviceTarget = self.inventory.find(router_id)?;
        Ok(self.runner.test_connection(&target).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::StoredBackup;
    use crate::device::{DeviceSession, RemoteFile, TransferSession};
    use crate::error::BackupError;
    use crate::model::DriveFile;
    use async_trait::async_trait;
    use chrono::{Duration as ChronoDuration, TimeZone, Utc};
    use std::path::Path;
    use std::sync::Mutex;
    use std::time::Duration;

    struct StubDevice;
    struct StubSession {
        identity: String,
    }

    #[async_trait]
    impl DeviceConnector for StubDevice {
        type Session = StubSession;

        async fn connect(&self, target: &DeviceTarget) -> Result<Self::Session> {
            if target.ip == "10.0.0.99" {
                return Err(BackupError::connection("connection refused"));
            }
            Ok(StubSession {
                identity: target.display_name(),
            })
        }
    }

    #[async_trait]
    impl DeviceSession for StubSession {
        async fn identity(&mut self) -> Result<String> {
            Ok(self.identity.clone())
        }
        async fn export_config(&mut self, _stem: &str, _show_sensitive: bool) -> Result<()> {
            Ok(())
        }
        async fn save_snapshot(&mut self, _stem: &str) -> Result<()> {
            Ok(())
        }
        async fn list_files(&mut self) -> Result<Vec<RemoteFile>> {
            Ok(Vec::new())
        }
        async fn remove_file(&mut self, _file_id: &str) -> Result<()> {
            Ok(())
        }
        async fn close(&mut self) {}
    }

    struct StubTransfer;
    struct StubTransferSession;

    #[async_trait]
    impl TransferConnector for StubTransfer {
        type Session = StubTransferSession;

        async fn connect(&self, _target: &DeviceTarget) -> Result<Self::Session> {
            Ok(StubTransferSession)
        }
    }

    #[async_trait]
    impl TransferSession for StubTransferSession {
        async fn download(&mut self, _remote_name: &str, local_path: &Path) -> Result<()> {
            std::fs::write(local_path, b"dummy")?;
            Ok(())
        }
        async fn close(&mut self) {}
    }

    struct MemStore {
        authorized: bool,
        stored: Mutex<Vec<StoredBackup>>,
        next_id: Mutex<u64>,
    }

    impl MemStore {
        fn new(authorized: bool) -> Self {
            Self {
                authorized,
                stored: Mutex::new(Vec::new()),
                next_id: Mutex::new(0),
            }
        }

        fn preload_r1(&self, count: usize) {
            let base = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
            let mut stored = self.stored.lock().unwrap();
            for i in 0..count {
                stored.push(StoredBackup {
                    id: format!("pre{i}"),
                    name: format!("R1-2023010{}-000000.rsc", i % 9 + 1),
                    created_time: base + ChronoDuration::hours(i as i64),
                });
            }
        }

        fn count_prefix(&self, prefix: &str) -> usize {
            self.stored
                .lock()
                .unwrap()
                .iter()
                .filter(|f| f.name.starts_with(prefix))
                .count()
        }
    }

    #[async_trait]
    impl CloudStore for MemStore {
        async fn is_authorized(&self) -> bool {
            self.authorized
        }

        async fn upload(&self, local_path: &Path, _folder_id: Option<&str>) -> Result<DriveFile> {
            let name = local_path
                .file_name()
                .unwrap()
                .to_string_lossy()
                .into_owned();
            let mut next_id = self.next_id.lock().unwrap();
            *next_id += 1;
            let id = format!("up{}", *next_id);
            self.stored.lock().unwrap().push(StoredBackup {
                id: id.clone(),
                name: name.clone(),
                created_time: Utc::now() + ChronoDuration::seconds(*next_id as i64),
            });
            Ok(DriveFile {
                id,
                name,
                link: None,
            })
        }

        async fn list_by_prefix(
            &self,
            prefix: &str,
            _folder_id: Option<&str>,
        ) -> Result<Vec<StoredBackup>> {
            let mut entries: Vec<StoredBackup> = self
                .stored
                .lock()
                .unwrap()
                .iter()
                .filter(|f| f.name.starts_with(prefix))
                .cloned()
                .collect();
            entries.sort_by(|a, b| b.created_time.cmp(&a.created_time));
            Ok(entries)
        }

        async fn delete(&self, file_id: &str) -> Result<()> {
            self.stored.lock().unwrap().retain(|f| f.id != file_id);
            Ok(())
        }
    }

    struct Fixture {
        service: BackupService<StubDevice, StubTransfer>,
        store: Arc<MemStore>,
        dir: tempfile::TempDir,
    }

    fn fixture(authorized: bool, routers: &str) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("routers.json"), routers).unwrap();

        let store = Arc::new(MemStore::new(authorized));
        let runner = BackupRunner::new(
            StubDevice,
            StubTransfer,
            dir.path().join("backups"),
        )
        .with_settle_delay(Duration::ZERO);
        let service = BackupService::new(
            runner,
            Inventory::new(dir.path().join("routers.json")),
            SettingsStore::new(dir.path().join("settings.json")),
            store.clone(),
            LogRecorder::new(dir.path().join("backup_log.json")),
        );
        Fixture {
            service,
            store,
            dir,
        }
    }

    const TWO_ROUTERS: &str = r#"[
        {"id": "bad", "name": "Dead", "ip": "10.0.0.99", "username": "admin", "password": "x"},
        {"id": "r1", "name": "R1", "ip": "10.0.0.5", "username": "admin", "password": "x"}
    ]"#;

    #[tokio::test]
    async fn sweep_survives_one_failed_device_and_records_all_outcomes() {
        let f = fixture(true, TWO_ROUTERS);

        let outcomes = f.service.backup_all(Trigger::ManualAll).await;
        assert_eq!(outcomes.len(), 2);
        assert!(!outcomes[0].success);
        assert!(outcomes[1].success);

        let history = f.service.recorder().load().unwrap();
        assert_eq!(history.len(), 2);
        assert!(history.iter().all(|o| o.triggered_by == Trigger::ManualAll));
        // 成功的那台带上传结果，失败的那台没有
        assert!(history[0].drive_files.is_none());
        assert_eq!(history[1].drive_files.as_ref().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn unauthorized_cloud_skips_upload_entirely() {
        let f = fixture(false, TWO_ROUTERS);

        let outcome = f.service.backup_by_id("r1", Trigger::Manual).await.unwrap();
        assert!(outcome.success);
        assert!(outcome.drive_files.is_none());
        assert!(outcome.drive_errors.is_none());
        assert_eq!(f.store.count_prefix("R1-"), 0);
        // 本地文件保留
        for path in &outcome.local_files {
            assert!(path.exists());
        }
    }

    #[tokio::test]
    async fn scheduled_sweep_prunes_to_twelve() {
        let f = fixture(
            true,
            r#"[{"id": "r1", "name": "R1", "ip": "10.0.0.5", "username": "admin", "password": "x"}]"#,
        );
        f.store.preload_r1(15);

        let outcomes = f.service.backup_all(Trigger::Scheduler).await;
        assert!(outcomes[0].success);
        assert_eq!(outcomes[0].triggered_by, Trigger::Scheduler);

        // 15 份旧备份加 2 份新上传，清理后恰好 12 份
        assert_eq!(f.store.count_prefix("R1-"), 12);
    }

    #[tokio::test]
    async fn manual_trigger_prunes_to_two() {
        let f = fixture(
            true,
            r#"[{"id": "r1", "name": "R1", "ip": "10.0.0.5", "username": "admin", "password": "x"}]"#,
        );
        f.store.preload_r1(5);

        let outcome = f.service.backup_by_id("r1", Trigger::Manual).await.unwrap();
        assert!(outcome.success);
        assert_eq!(f.store.count_prefix("R1-"), 2);
    }

    #[tokio::test]
    async fn delete_local_after_upload_respected() {
        let f = fixture(
            true,
            r#"[{"id": "r1", "name": "R1", "ip": "10.0.0.5", "username": "admin", "password": "x"}]"#,
        );
        let settings = crate::settings::Settings {
            delete_local_after_upload: true,
            ..Default::default()
        };
        f.service.settings().save(&settings).unwrap();

        let outcome = f.service.backup_by_id("r1", Trigger::Manual).await.unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.local_deleted, Some(true));
        for path in &outcome.local_files {
            assert!(!path.exists(), "{} 应已删除", path.display());
        }
        drop(f.dir);
    }

    #[tokio::test]
    async fn test_connection_reports_identity() {
        let f = fixture(true, TWO_ROUTERS);

        let (ok, message) = f.service.test_connection("r1").await.unwrap();
        assert!(ok);
        assert_eq!(message, "Connected successfully to 'R1'");

        let (ok, message) = f.service.test_connection("bad").await.unwrap();
        assert!(!ok);
        assert!(message.starts_with("Connection failed: "));

        assert!(f.service.test_connection("nope").await.is_err());
    }
}
