use crate::constants::retention;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// 清单中的一台路由器
///
/// 由外部清单文件管理，单次备份事务期间视为不可变
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceTarget {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub ip: String,
    pub username: String,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ftp_port: Option<u16>,
}

impl DeviceTarget {
    pub fn api_port(&self) -> u16 {
        self.api_port
            .unwrap_or(crate::constants::routeros::DEFAULT_API_PORT)
    }

    pub fn ftp_port(&self) -> u16 {
        self.ftp_port
            .unwrap_or(crate::constants::routeros::DEFAULT_FTP_PORT)
    }

    /// 展示名称，名称为空时回退到 IP
    pub fn display_name(&self) -> String {
        if self.name.is_empty() {
            self.ip.clone()
        } else {
            self.name.clone()
        }
    }
}

/// 备份的触发来源，决定云端保留数量
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    Manual,
    ManualAll,
    Scheduler,
}

impl Trigger {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::ManualAll => "manual_all",
            Self::Scheduler => "scheduler",
        }
    }

    /// 手动触发只留一个短的安全窗口，定时触发保留更长的历史
    pub fn keep_latest(self) -> usize {
        match self {
            Self::Scheduler => retention::KEEP_LATEST_SCHEDULED,
            Self::Manual | Self::ManualAll => retention::KEEP_LATEST_MANUAL,
        }
    }
}

/// 成功上传到 Google Drive 的一个文件
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriveFile {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

/// 一次备份事务的结构化结果，创建后不再修改，追加到历史记录
///
/// JSON 键名是稳定契约：`success`、`router_id`、`router_name`、`message`、
/// `local_files`、`timestamp`、`triggered_by`，可选 `drive_files`、
/// `drive_errors`、`local_deleted`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupOutcome {
    pub success: bool,
    pub router_id: String,
    pub router_name: String,
    pub message: String,
    pub local_files: Vec<PathBuf>,
    pub timestamp: DateTime<Utc>,
    pub triggered_by: Trigger,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drive_files: Option<Vec<DriveFile>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drive_errors: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_deleted: Option<bool>,
}

impl BackupOutcome {
    pub fn success(target: &DeviceTarget, message: String, local_files: Vec<PathBuf>) -> Self {
        Self::new(target, true, message, local_files)
    }

    pub fn failure(target: &DeviceTarget, message: String) -> Self {
        Self::new(target, false, message, Vec::new())
    }

    fn new(
        target: &DeviceTarget,
        success: bool,
        message: String,
        local_files: Vec<PathBuf>,
    ) -> Self {
        Self {
            success,
            router_id: target.id.clone(),
            router_name: target.display_name(),
            message,
            local_files,
            timestamp: Utc::now(),
            triggered_by: Trigger::Manual,
            drive_files: None,
            drive_errors: None,
            local_deleted: None,
        }
    }
}
