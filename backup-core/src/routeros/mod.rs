//! RouterOS API 会话：本系统消费的设备管理能力的生产实现

pub mod protocol;

use crate::constants::routeros as consts;
use crate::device::{DeviceConnector, DeviceSession, RemoteFile};
use crate::error::{BackupError, Result};
use crate::model::DeviceTarget;
use async_trait::async_trait;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

/// RouterOS API 连接工厂
#[derive(Debug, Clone)]
pub struct RouterOsConnector {
    connect_timeout: Duration,
}

impl Default for RouterOsConnector {
    fn default() -> Self {
        Self {
            connect_timeout: consts::CONNECT_TIMEOUT,
        }
    }
}

impl RouterOsConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

#[async_trait]
impl DeviceConnector for RouterOsConnector {
    type Session = RouterOsSession;

    async fn connect(&self, target: &DeviceTarget) -> Result<Self::Session> {
        let addr = format!("{}:{}", target.ip, target.api_port());
        let stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| BackupError::Connection(format!("{addr}: 连接超时")))?
            .map_err(|e| BackupError::Connection(format!("{addr}: {e}")))?;

        let mut session = RouterOsSession { stream };
        session.login(&target.username, &target.password).await?;
        Ok(session)
    }
}

/// 一条已登录的 RouterOS API 会话
pub struct RouterOsSession {
    stream: TcpStream,
}

impl RouterOsSession {
    /// 6.43+ 明文登录；失败的 trap 按认证错误上报
    async fn login(&mut self, username: &str, password: &str) -> Result<()> {
        let words = vec![
            "/login".to_string(),
            format!("=name={username}"),
            format!("=password={password}"),
        ];
        protocol::run_command(&mut self.stream, &words)
            .await
            .map_err(|e| match e {
                BackupError::Command(msg) => BackupError::Auth(msg),
                other => other,
            })?;
        Ok(())
    }
}

#[async_trait]
impl DeviceSession for RouterOsSession {
    async fn identity(&mut self) -> Result<String> {
        let rows = protocol::run_command(
            &mut self.stream,
            &["/system/identity/print".to_string()],
        )
        .await?;
        rows.into_iter()
            .find_map(|mut row| row.remove("name"))
            .ok_or_else(|| BackupError::command("设备未返回 identity"))
    }

    async fn export_config(&mut self, stem: &str, show_sensitive: bool) -> Result<()> {
        let mut words = vec!["/export".to_string(), format!("=file={stem}")];
        if show_sensitive {
            words.push("=show-sensitive=yes".to_string());
        }
        protocol::run_command(&mut self.stream, &words).await?;
        Ok(())
    }

    async fn save_snapshot(&mut self, stem: &str) -> Result<()> {
        let words = vec![
            "/system/backup/save".to_string(),
            format!("=name={stem}"),
        ];
        protocol::run_command(&mut self.stream, &words).await?;
        Ok(())
    }

    async fn list_files(&mut self) -> Result<Vec<RemoteFile>> {
        let rows =
            protocol::run_command(&mut self.stream, &["/file/print".to_string()]).await?;
        Ok(rows
            .into_iter()
            .filter_map(|mut row| {
                let id = row.remove(".id")?;
                let name = row.remove("name")?;
                Some(RemoteFile { id, name })
            })
            .collect())
    }

    async fn remove_file(&mut self, file_id: &str) -> Result<()> {
        let words = vec!["/file/remove".to_string(), format!("=.id={file_id}")];
        protocol::run_command(&mut self.stream, &words).await?;
        Ok(())
    }

    async fn close(&mut self) {
        let _ = self.stream.shutdown().await;
    }
}
