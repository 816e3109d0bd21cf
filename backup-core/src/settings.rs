use crate::error::Result;
use crate::scheduler::{ScheduleDescriptor, ScheduleMode};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

fn default_schedule_type() -> String {
    "interval".to_string()
}

fn default_interval_hours() -> u64 {
    24
}

fn default_cron_hour() -> u32 {
    2
}

/// 持久化设置，对应 data/settings.json
///
/// 核心只消费解析后的调度描述，其余字段原样读写
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Settings {
    #[serde(default)]
    pub schedule_enabled: bool,
    /// "interval" 或 "cron"
    #[serde(default = "default_schedule_type")]
    pub schedule_type: String,
    #[serde(default = "default_interval_hours")]
    pub schedule_interval_hours: u64,
    #[serde(default = "default_cron_hour")]
    pub schedule_cron_hour: u32,
    #[serde(default)]
    pub schedule_cron_minute: u32,
    #[serde(default)]
    pub google_drive_folder_id: String,
    #[serde(default)]
    pub delete_local_after_upload: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            schedule_enabled: false,
            schedule_type: default_schedule_type(),
            schedule_interval_hours: default_interval_hours(),
            schedule_cron_hour: default_cron_hour(),
            schedule_cron_minute: 0,
            google_drive_folder_id: String::new(),
            delete_local_after_upload: false,
        }
    }
}

impl Settings {
    /// 空字符串按未配置处理
    pub fn folder_id(&self) -> Option<&str> {
        if self.google_drive_folder_id.is_empty() {
            None
        } else {
            Some(&self.google_drive_folder_id)
        }
    }

    /// 解析为调度描述，未知的 schedule_type 按 interval 处理
    pub fn schedule(&self) -> ScheduleDescriptor {
        let mode = if self.schedule_type == "cron" {
            ScheduleMode::Daily {
                hour: self.schedule_cron_hour.min(23),
                minute: self.schedule_cron_minute.min(59),
            }
        } else {
            ScheduleMode::Interval {
                hours: self.schedule_interval_hours.max(1),
            }
        };
        ScheduleDescriptor {
            enabled: self.schedule_enabled,
            mode,
        }
    }
}

/// settings.json 的读写入口
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 读取设置，文件不存在时返回默认值
    pub fn load(&self) -> Result<Settings> {
        if !self.path.exists() {
            return Ok(Settings::default());
        }
        let content = std::fs::read_to_string(&self.path)?;
        let settings: Settings = serde_json::from_str(&content)?;
        Ok(settings)
    }

    /// 原子写回，避免并发读到半截文件
    pub fn save(&self, settings: &Settings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let parent = self.path.parent().unwrap_or(Path::new("."));
        let tmp = NamedTempFile::new_in(parent)?;
        serde_json::to_writer_pretty(&tmp, settings)?;
        tmp.persist(&self.path)
            .map_err(|e| std::io::Error::from(e.error))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_values() {
        let s = Settings::default();
        assert!(!s.schedule_enabled);
        assert_eq!(s.schedule_type, "interval");
        assert_eq!(s.schedule_interval_hours, 24);
        assert_eq!(s.schedule_cron_hour, 2);
        assert_eq!(s.schedule_cron_minute, 0);
        assert!(s.folder_id().is_none());
        assert!(!s.delete_local_after_upload);
    }

    #[test]
    fn schedule_resolution() {
        let mut s = Settings {
            schedule_enabled: true,
            ..Settings::default()
        };
        assert_eq!(
            s.schedule(),
            ScheduleDescriptor {
                enabled: true,
                mode: ScheduleMode::Interval { hours: 24 }
            }
        );

        s.schedule_type = "cron".to_string();
        s.schedule_cron_hour = 2;
        s.schedule_cron_minute = 30;
        assert_eq!(
            s.schedule(),
            ScheduleDescriptor {
                enabled: true,
                mode: ScheduleMode::Daily { hour: 2, minute: 30 }
            }
        );
    }

    #[test]
    fn store_round_trip_and_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json"));

        assert_eq!(store.load().unwrap(), Settings::default());

        let mut settings = Settings::default();
        settings.schedule_enabled = true;
        settings.google_drive_folder_id = "folder123".to_string();
        store.save(&settings).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded, settings);
        assert_eq!(loaded.folder_id(), Some("folder123"));
    }
}
