//! FTP 文件传输：本系统消费的传输能力的生产实现
//!
//! suppaftp 是阻塞式客户端，所有调用都移到 `spawn_blocking`，
//! 流对象随闭包往返传递

use crate::constants::routeros as consts;
use crate::device::{TransferConnector, TransferSession};
use crate::error::{BackupError, Result};
use crate::model::DeviceTarget;
use async_trait::async_trait;
use std::net::ToSocketAddrs;
use std::path::Path;
use std::time::Duration;
use suppaftp::FtpStream;
use suppaftp::types::FileType;

/// FTP 连接工厂
#[derive(Debug, Clone)]
pub struct FtpTransferConnector {
    connect_timeout: Duration,
}

impl Default for FtpTransferConnector {
    fn default() -> Self {
        Self {
            connect_timeout: consts::TRANSFER_TIMEOUT,
        }
    }
}

impl FtpTransferConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

#[async_trait]
impl TransferConnector for FtpTransferConnector {
    type Session = FtpTransferSession;

    async fn connect(&self, target: &DeviceTarget) -> Result<Self::Session> {
        let addr_str = format!("{}:{}", target.ip, target.ftp_port());
        let timeout = self.connect_timeout;
        let username = target.username.clone();
        let password = target.password.clone();

        let stream = tokio::task::spawn_blocking(move || -> Result<FtpStream> {
            let addr = addr_str
                .to_socket_addrs()
                .map_err(|e| BackupError::Connection(format!("{addr_str}: {e}")))?
                .next()
                .ok_or_else(|| BackupError::Connection(format!("{addr_str}: 无法解析地址")))?;
            let mut ftp = FtpStream::connect_timeout(addr, timeout)?;
            ftp.login(&username, &password)?;
            // 备份文件必须按二进制传输
            ftp.transfer_type(FileType::Binary)?;
            Ok(ftp)
        })
        .await??;

        Ok(FtpTransferSession {
            stream: Some(stream),
        })
    }
}

/// 一条已登录的 FTP 会话
pub struct FtpTransferSession {
    stream: Option<FtpStream>,
}

#[async_trait]
impl TransferSession for FtpTransferSession {
    async fn download(&mut self, remote_name: &str, local_path: &Path) -> Result<()> {
        let mut stream = self
            .stream
            .take()
            .ok_or_else(|| BackupError::transfer("FTP 连接已关闭"))?;
        let remote = remote_name.to_string();
        let local = local_path.to_path_buf();

        let (stream, result) = tokio::task::spawn_blocking(move || {
            let result = (|| -> Result<()> {
                let data = stream.retr_as_buffer(&remote)?;
                std::fs::write(&local, data.into_inner())?;
                Ok(())
            })();
            (stream, result)
        })
        .await?;

        self.stream = Some(stream);
        result
    }

    async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            let _ = tokio::task::spawn_blocking(move || stream.quit()).await;
        }
    }
}
