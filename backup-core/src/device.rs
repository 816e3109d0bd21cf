use crate::error::Result;
use crate::model::DeviceTarget;
use async_trait::async_trait;
use std::path::Path;

/// 设备上的一个文件条目（/file 列表）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    pub id: String,
    pub name: String,
}

/// 管理协议连接工厂
#[async_trait]
pub trait DeviceConnector: Send + Sync {
    type Session: DeviceSession;

    async fn connect(&self, target: &DeviceTarget) -> Result<Self::Session>;
}

/// 一条已建立的设备管理会话
///
/// 对应消费的 RouterOS API 能力：身份查询、导出、快照、文件列表与删除
#[async_trait]
pub trait DeviceSession: Send {
    /// 设备自报的名称，作为备份文件名前缀
    async fn identity(&mut self) -> Result<String>;

    /// 生成文本配置导出（.rsc）
    async fn export_config(&mut self, stem: &str, show_sensitive: bool) -> Result<()>;

    /// 生成二进制快照（.backup）
    async fn save_snapshot(&mut self, stem: &str) -> Result<()>;

    async fn list_files(&mut self) -> Result<Vec<RemoteFile>>;

    async fn remove_file(&mut self, file_id: &str) -> Result<()>;

    /// 关闭会话，任何错误就地吞掉
    async fn close(&mut self);
}

/// 文件传输连接工厂
#[async_trait]
pub trait TransferConnector: Send + Sync {
    type Session: TransferSession;

    async fn connect(&self, target: &DeviceTarget) -> Result<Self::Session>;
}

/// 一条已建立的文件传输会话
#[async_trait]
pub trait TransferSession: Send {
    /// 下载设备上的命名文件到本地路径
    async fn download(&mut self, remote_name: &str, local_path: &Path) -> Result<()>;

    /// 关闭会话，任何错误就地吞掉
    async fn close(&mut self);
}
