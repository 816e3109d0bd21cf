//! OAuth2 token 的读取、刷新与持久化
//!
//! token 可以来自环境变量（部署场景）或凭据目录下的 token.json。
//! 刷新在一把锁内完成：读取、请求、写回，避免留下半截 token 文件

use crate::constants::gdrive as consts;
use crate::error::{BackupError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::sync::Mutex;

/// 磁盘上的 token 结构，字段与 google-auth 写出的 token.json 对齐
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredToken {
    /// access token
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scopes: Option<Vec<String>>,
    /// RFC3339 过期时间
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<String>,
}

impl StoredToken {
    /// 是否已过期（带提前量；没有过期时间按已过期处理，强制刷新一次）
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expiry.as_deref().and_then(parse_expiry) {
            Some(expiry) => expiry - Duration::seconds(consts::TOKEN_EXPIRY_MARGIN_SECS) <= now,
            None => true,
        }
    }

    pub fn token_uri(&self) -> &str {
        self.token_uri.as_deref().unwrap_or(consts::DEFAULT_TOKEN_URL)
    }
}

fn parse_expiry(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// token 刷新端点的应答
#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
    expires_in: i64,
}

/// token 的存取入口
///
/// `refreshed` 既是刷新结果的内存缓存，也把并发刷新串行化；
/// 环境变量来源的 token 不落盘，后续调用只能靠这份缓存避免重复刷新
pub struct TokenStore {
    path: PathBuf,
    refreshed: Mutex<Option<StoredToken>>,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            refreshed: Mutex::new(None),
        }
    }

    fn env_token() -> Option<StoredToken> {
        let raw = std::env::var(consts::TOKEN_ENV).ok()?;
        serde_json::from_str(&raw).ok()
    }

    /// 环境变量优先，其次是 token 文件
    pub fn load(&self) -> Result<StoredToken> {
        if let Some(token) = Self::env_token() {
            return Ok(token);
        }
        if !self.path.exists() {
            return Err(BackupError::NotAuthorized);
        }
        let content = std::fs::read_to_string(&self.path)?;
        let token: StoredToken = serde_json::from_str(&content)?;
        Ok(token)
    }

    /// 有可用凭据即视为已授权：token 未过期，或有 refresh token 可刷新
    pub fn is_authorized(&self) -> bool {
        match self.load() {
            Ok(token) => !token.is_expired(Utc::now()) || token.refresh_token.is_some(),
            Err(_) => false,
        }
    }

    /// 原子写回 token 文件
    fn save(&self, token: &StoredToken) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let parent = self.path.parent().unwrap_or(Path::new("."));
        let tmp = NamedTempFile::new_in(parent)?;
        serde_json::to_writer(&tmp, token)?;
        tmp.persist(&self.path)
            .map_err(|e| std::io::Error::from(e.error))?;
        Ok(())
    }

    /// 取一个可用的 access token，过期时先刷新再返回
    pub async fn access_token(&self, http: &reqwest::Client) -> Result<String> {
        let mut cached = self.refreshed.lock().await;

        if let Some(token) = cached.as_ref() {
            if !token.is_expired(Utc::now()) {
                return Ok(token.token.clone());
            }
        }

        let token = self.load()?;
        if !token.is_expired(Utc::now()) {
            return Ok(token.token);
        }

        let refreshed = self.refresh(http, &token).await?;
        // 刷新成功才落盘，失败时旧 token 原样保留；
        // 环境变量来源的 token 只进内存缓存
        if Self::env_token().is_none() {
            self.save(&refreshed)?;
        }
        *cached = Some(refreshed.clone());
        Ok(refreshed.token)
    }

    async fn refresh(&self, http: &reqwest::Client, token: &StoredToken) -> Result<StoredToken> {
        let refresh_token = token
            .refresh_token
            .as_deref()
            .ok_or(BackupError::NotAuthorized)?;
        let client_id = token
            .client_id
            .as_deref()
            .ok_or_else(|| BackupError::cloud("token 缺少 client_id，无法刷新"))?;
        let client_secret = token.client_secret.as_deref().unwrap_or_default();

        tracing::debug!("access token 已过期，向 {} 刷新", token.token_uri());

        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", client_id),
            ("client_secret", client_secret),
        ];
        let response = http.post(token.token_uri()).form(&params).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(BackupError::cloud(format!(
                "token 刷新失败: {status} - {text}"
            )));
        }

        let refreshed: RefreshResponse = response.json().await?;
        let mut updated = token.clone();
        updated.token = refreshed.access_token;
        updated.expiry =
            Some((Utc::now() + Duration::seconds(refreshed.expires_in)).to_rfc3339());
        Ok(updated)
    }
}
