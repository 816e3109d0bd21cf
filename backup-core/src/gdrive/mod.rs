//! Google Drive v3 客户端：云端存储能力的生产实现
//!
//! 只实现核心消费的四个操作，OAuth 授权流程在外部完成

pub mod token;

use crate::cloud::{CloudStore, StoredBackup};
use crate::constants::gdrive as consts;
use crate::error::{BackupError, Result};
use crate::model::DriveFile;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use token::TokenStore;

/// Drive 文件查询应答
#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<FileEntry>,
}

#[derive(Debug, Deserialize)]
struct FileEntry {
    id: String,
    name: String,
    #[serde(rename = "createdTime")]
    created_time: Option<String>,
    #[serde(rename = "webViewLink")]
    web_view_link: Option<String>,
}

/// 进程级共享的 Drive 客户端，显式构造后按句柄传递
pub struct GoogleDriveClient {
    http: reqwest::Client,
    tokens: TokenStore,
}

impl GoogleDriveClient {
    pub fn new(token_path: impl Into<PathBuf>) -> Self {
        Self {
            http: reqwest::Client::new(),
            tokens: TokenStore::new(token_path),
        }
    }

    async fn bearer(&self) -> Result<String> {
        self.tokens.access_token(&self.http).await
    }

    /// Drive 查询串里的单引号转义
    fn escape(value: &str) -> String {
        value.replace('\\', "\\\\").replace('\'', "\\'")
    }
}

#[async_trait]
impl CloudStore for GoogleDriveClient {
    async fn is_authorized(&self) -> bool {
        self.tokens.is_authorized()
    }

    async fn upload(&self, local_path: &Path, folder_id: Option<&str>) -> Result<DriveFile> {
        let file_name = local_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| BackupError::cloud(format!("无效的文件路径: {}", local_path.display())))?;

        let token = self.bearer().await?;
        let data = tokio::fs::read(local_path).await?;

        let mut metadata = serde_json::json!({ "name": file_name });
        if let Some(folder) = folder_id {
            metadata["parents"] = serde_json::json!([folder]);
        }

        // Drive 的 multipart 上传要求 multipart/related，手工拼装消息体
        let boundary = format!("backup_{}", uuid::Uuid::new_v4().simple());
        let mut body: Vec<u8> = Vec::with_capacity(data.len() + 512);
        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        body.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
        body.extend_from_slice(metadata.to_string().as_bytes());
        body.extend_from_slice(format!("\r\n--{boundary}\r\n").as_bytes());
        body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        body.extend_from_slice(&data);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

        let response = self
            .http
            .post(consts::UPLOAD_URL)
            .query(&[
                ("uploadType", "multipart"),
                ("fields", "id, name, webViewLink"),
            ])
            .bearer_auth(token)
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("multipart/related; boundary={boundary}"),
            )
            .body(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(BackupError::cloud(format!(
                "Upload failed: {status} - {text}"
            )));
        }

        let entry: FileEntry = response.json().await?;
        tracing::info!("已上传到 Google Drive: {}", entry.name);
        Ok(DriveFile {
            id: entry.id,
            name: entry.name,
            link: entry.web_view_link,
        })
    }

    async fn list_by_prefix(
        &self,
        prefix: &str,
        folder_id: Option<&str>,
    ) -> Result<Vec<StoredBackup>> {
        let token = self.bearer().await?;

        // Drive 查询只有 contains，前缀匹配在客户端补一刀
        let mut query = format!(
            "name contains '{}' and mimeType != 'application/vnd.google-apps.folder'",
            Self::escape(prefix)
        );
        if let Some(folder) = folder_id {
            query.push_str(&format!(" and '{}' in parents", Self::escape(folder)));
        }

        let response = self
            .http
            .get(consts::FILES_URL)
            .query(&[
                ("q", query.as_str()),
                ("orderBy", "createdTime desc"),
                ("pageSize", "100"),
                ("fields", "files(id, name, createdTime)"),
            ])
            .bearer_auth(token)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(BackupError::cloud(format!(
                "Failed to list files: {status} - {text}"
            )));
        }

        let list: FileList = response.json().await?;
        Ok(list
            .files
            .into_iter()
            .filter(|f| f.name.starts_with(prefix))
            .map(|f| {
                let created_time = f
                    .created_time
                    .as_deref()
                    .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
                    .map(|dt| dt.with_timezone(&Utc))
                    .unwrap_or_else(|| DateTime::<Utc>::MIN_UTC);
                StoredBackup {
                    id: f.id,
                    name: f.name,
                    created_time,
                }
            })
            .collect())
    }

    async fn delete(&self, file_id: &str) -> Result<()> {
        let token = self.bearer().await?;
        let url = format!("{}/{file_id}", consts::FILES_URL);
        let response = self.http.delete(&url).bearer_auth(token).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(BackupError::cloud(format!(
                "Failed to delete file: {status} - {text}"
            )));
        }
        Ok(())
    }
}
