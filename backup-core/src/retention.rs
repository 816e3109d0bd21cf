//! 上传与云端保留策略
//!
//! 逐个上传本地备份文件，失败记录后继续；有成功上传时，
//! 按设备前缀清理云端旧备份，只保留最近 N 份

use crate::cloud::CloudStore;
use crate::error::Result;
use crate::model::DriveFile;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// 一次上传处理的汇总，回填到备份结果的可选字段
#[derive(Debug, Default)]
pub struct UploadReport {
    pub drive_files: Vec<DriveFile>,
    pub drive_errors: Vec<String>,
    pub local_deleted: bool,
}

/// 从备份文件名推导设备标识：去掉扩展名和结尾的 `-YYYYMMDD-HHMMSS`
///
/// 不符合命名约定的文件返回 None，跳过清理而不是误删
pub fn device_identity(file_name: &str) -> Option<String> {
    let stem = file_name
        .strip_suffix(".rsc")
        .or_else(|| file_name.strip_suffix(".backup"))
        .unwrap_or(file_name);

    let mut parts = stem.rsplitn(3, '-');
    let time = parts.next()?;
    let date = parts.next()?;
    let identity = parts.next()?;

    let all_digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    if time.len() == 6 && all_digits(time) && date.len() == 8 && all_digits(date)
        && !identity.is_empty()
    {
        Some(identity.to_string())
    } else {
        None
    }
}

/// 云端上传与保留清理的执行者
pub struct RetentionUploader {
    store: Arc<dyn CloudStore>,
}

impl RetentionUploader {
    pub fn new(store: Arc<dyn CloudStore>) -> Self {
        Self { store }
    }

    /// 上传一批本地文件并执行保留清理
    ///
    /// 单个文件上传失败只记录错误，不中断其余文件；
    /// 本地删除只在该文件确认上传成功之后进行
    pub async fn process(
        &self,
        local_files: &[PathBuf],
        folder_id: Option<&str>,
        delete_local: bool,
        keep_latest: usize,
    ) -> UploadReport {
        let mut report = UploadReport::default();

        for local_file in local_files {
            match self.store.upload(local_file, folder_id).await {
                Ok(drive_file) => {
                    report.drive_files.push(drive_file);
                    if delete_local {
                        if let Err(e) = std::fs::remove_file(local_file) {
                            warn!("本地文件删除失败 {}: {}", local_file.display(), e);
                        }
                    }
                }
                Err(e) => {
                    warn!("上传失败 {}: {}", local_file.display(), e);
                    report.drive_errors.push(e.to_string());
                }
            }
        }

        if let Some(first) = report.drive_files.first() {
            if let Some(identity) = device_identity(&first.name) {
                // 清理失败不向上传播，下次触发还有机会
                if let Err(e) = self.prune(&identity, folder_id, keep_latest).await {
                    warn!("云端旧备份清理失败 {}: {}", identity, e);
                } else {
                    info!("已清理 {} 的云端旧备份", identity);
                }
            }
        }

        report.local_deleted = delete_local && !report.drive_files.is_empty();
        report
    }

    /// 删除该设备标识下超出保留数量的旧备份，只针对这个前缀，绝不全量清空
    async fn prune(&self, identity: &str, folder_id: Option<&str>, keep_latest: usize) -> Result<()> {
        let prefix = format!("{identity}-");
        let stored = self.store.list_by_prefix(&prefix, folder_id).await?;

        for old in stored.iter().skip(keep_latest) {
            self.store.delete(&old.id).await?;
            info!("已删除云端旧备份: {}", old.name);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::StoredBackup;
    use crate::error::BackupError;
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone, Utc};
    use std::collections::HashSet;
    use std::path::Path;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MockStore {
        fail_names: HashSet<String>,
        fail_delete: bool,
        // 按创建时间记录的云端文件
        stored: Mutex<Vec<StoredBackup>>,
        next_id: Mutex<u64>,
    }

    impl MockStore {
        fn preload(&self, names_newest_first: &[&str]) {
            let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
            let mut stored = self.stored.lock().unwrap();
            let count = names_newest_first.len() as i64;
            for (i, name) in names_newest_first.iter().enumerate() {
                stored.push(StoredBackup {
                    id: format!("pre{i}"),
                    name: name.to_string(),
                    created_time: base + Duration::hours(count - i as i64),
                });
            }
        }

        fn names(&self, prefix: &str) -> Vec<String> {
            let mut entries: Vec<StoredBackup> = self
                .stored
                .lock()
                .unwrap()
                .iter()
                .filter(|f| f.name.starts_with(prefix))
                .cloned()
                .collect();
            entries.sort_by(|a, b| b.created_time.cmp(&a.created_time));
            entries.into_iter().map(|f| f.name).collect()
        }
    }

    #[async_trait]
    impl CloudStore for MockStore {
        async fn is_authorized(&self) -> bool {
            true
        }

        async fn upload(&self, local_path: &Path, _folder_id: Option<&str>) -> Result<DriveFile> {
            let name = local_path
                .file_name()
                .unwrap()
                .to_string_lossy()
                .into_owned();
            if self.fail_names.contains(&name) {
                return Err(BackupError::cloud(format!("Upload failed: {name}")));
            }
            let mut next_id = self.next_id.lock().unwrap();
            *next_id += 1;
            let id = format!("up{}", *next_id);
            // 新上传的文件创建时间晚于所有预置文件
            self.stored.lock().unwrap().push(StoredBackup {
                id: id.clone(),
                name: name.clone(),
                created_time: Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
                    + Duration::seconds(*next_id as i64),
            });
            Ok(DriveFile {
                id,
                name,
                link: Some("https://drive.example/file".to_string()),
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
            if self.fail_delete {
                return Err(BackupError::cloud("delete failed"));
            }
            self.stored.lock().unwrap().retain(|f| f.id != file_id);
            Ok(())
        }
    }

    fn write_local(dir: &Path, names: &[&str]) -> Vec<PathBuf> {
        names
            .iter()
            .map(|name| {
                let path = dir.join(name);
                std::fs::write(&path, b"dummy").unwrap();
                path
            })
            .collect()
    }

    #[test]
    fn identity_strips_trailing_timestamp() {
        assert_eq!(
            device_identity("R1-20240101-020000.rsc").as_deref(),
            Some("R1")
        );
        assert_eq!(
            device_identity("R1-20240101-020000.backup").as_deref(),
            Some("R1")
        );
        // 设备名本身含连字符
        assert_eq!(
            device_identity("core-router-20240101-020000.rsc").as_deref(),
            Some("core-router")
        );
        // 不符合命名约定
        assert_eq!(device_identity("notes.txt"), None);
        assert_eq!(device_identity("-20240101-020000.rsc"), None);
    }

    #[tokio::test]
    async fn retention_keeps_latest_k_per_identity() {
        let store = Arc::new(MockStore::default());
        // 云端已有 15 份 R1 备份和一份其它设备的备份
        let prior: Vec<String> = (0..15)
            .map(|i| format!("R1-202401{:02}-000000.rsc", 15 - i))
            .collect();
        let prior_refs: Vec<&str> = prior.iter().map(String::as_str).collect();
        store.preload(&prior_refs);
        store.preload(&["R2-20240101-000000.rsc"]);

        let dir = tempfile::tempdir().unwrap();
        let files = write_local(dir.path(), &["R1-20240601-000000.rsc"]);

        let uploader = RetentionUploader::new(store.clone());
        let report = uploader.process(&files, None, false, 12).await;

        assert_eq!(report.drive_files.len(), 1);
        assert!(report.drive_errors.is_empty());

        // 恰好保留 12 份，且是创建时间最新的 12 份
        let remaining = store.names("R1-");
        assert_eq!(remaining.len(), 12);
        assert_eq!(remaining[0], "R1-20240601-000000.rsc");
        assert_eq!(remaining[1], "R1-20240115-000000.rsc");
        assert!(!remaining.contains(&"R1-20240104-000000.rsc".to_string()));
        // 其它设备不受影响
        assert_eq!(store.names("R2-").len(), 1);
    }

    #[tokio::test]
    async fn local_deleted_only_after_confirmed_upload() {
        let mut store = MockStore::default();
        store
            .fail_names
            .insert("R1-20240101-020000.backup".to_string());
        let store = Arc::new(store);

        let dir = tempfile::tempdir().unwrap();
        let files = write_local(
            dir.path(),
            &["R1-20240101-020000.rsc", "R1-20240101-020000.backup"],
        );

        let uploader = RetentionUploader::new(store);
        let report = uploader.process(&files, None, true, 2).await;

        assert_eq!(report.drive_files.len(), 1);
        assert_eq!(report.drive_errors.len(), 1);
        assert!(report.local_deleted);

        // 上传成功的已删除，失败的原样保留
        assert!(!files[0].exists());
        assert!(files[1].exists());
    }

    #[tokio::test]
    async fn upload_errors_do_not_abort_remaining_files() {
        let mut store = MockStore::default();
        store.fail_names.insert("R1-20240101-020000.rsc".to_string());
        let store = Arc::new(store);

        let dir = tempfile::tempdir().unwrap();
        let files = write_local(
            dir.path(),
            &["R1-20240101-020000.rsc", "R1-20240101-020000.backup"],
        );

        let uploader = RetentionUploader::new(store.clone());
        let report = uploader.process(&files, None, false, 2).await;

        // 第一个失败，第二个仍然上传
        assert_eq!(report.drive_files.len(), 1);
        assert_eq!(report.drive_files[0].name, "R1-20240101-020000.backup");
        assert_eq!(report.drive_errors.len(), 1);
        assert!(!report.local_deleted);
    }

    #[tokio::test]
    async fn prune_failure_is_swallowed() {
        let mut store = MockStore::default();
        store.fail_delete = true;
        let store = Arc::new(store);
        let prior: Vec<String> = (0..5)
            .map(|i| format!("R1-2024010{}-000000.rsc", 5 - i))
            .collect();
        let prior_refs: Vec<&str> = prior.iter().map(String::as_str).collect();
        store.preload(&prior_refs);

        let dir = tempfile::tempdir().unwrap();
        let files = write_local(dir.path(), &["R1-20240601-000000.rsc"]);

        let uploader = RetentionUploader::new(store);
        let report = uploader.process(&files, None, false, 2).await;

        // 清理失败，但上传结果不受影响
        assert_eq!(report.drive_files.len(), 1);
        assert!(report.drive_errors.is_empty());
    }

    #[tokio::test]
    async fn no_successful_upload_means_no_prune() {
        let mut store = MockStore::default();
        store.fail_names.insert("R1-20240601-000000.rsc".to_string());
        let store = Arc::new(store);
        store.preload(&["R1-20240105-000000.rsc", "R1-20240104-000000.rsc"]);

        let dir = tempfile::tempdir().unwrap();
        let files = write_local(dir.path(), &["R1-20240601-000000.rsc"]);

        let uploader = RetentionUploader::new(store.clone());
        let report = uploader.process(&files, None, true, 1).await;

        assert!(report.drive_files.is_empty());
        assert!(!report.local_deleted);
        // 本地文件保留，云端也没有清理
        assert!(files[0].exists());
        assert_eq!(store.names("R1-").len(), 2);
    }
}
