use crate::error::Result;
use crate::model::DriveFile;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::Path;

/// 云端已存在的一个备份文件
#[derive(Debug, Clone)]
pub struct StoredBackup {
    pub id: String,
    pub name: String,
    pub created_time: DateTime<Utc>,
}

/// 本系统消费的云端存储能力
///
/// 授权流程在外部完成，核心只需要四个操作。
/// `list_by_prefix` 必须按创建时间降序返回（最新在前）
#[async_trait]
pub trait CloudStore: Send + Sync {
    async fn is_authorized(&self) -> bool;

    async fn upload(&self, local_path: &Path, folder_id: Option<&str>) -> Result<DriveFile>;

    async fn list_by_prefix(
        &self,
        prefix: &str,
        folder_id: Option<&str>,
    ) -> Result<Vec<StoredBackup>>;

    async fn delete(&self, file_id: &str) -> Result<()>;
}
