//! 备份历史记录：有界的 JSON 追加日志
//!
//! 追加是读-改-写，进程内经互斥锁串行化，落盘用临时文件替换；
//! 跨进程并发仍是后写覆盖

use crate::constants::history::MAX_LOG_ENTRIES;
use crate::error::Result;
use crate::model::BackupOutcome;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::sync::Mutex;

pub struct LogRecorder {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl LogRecorder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// 读取全部历史，文件不存在时为空
    pub fn load(&self) -> Result<Vec<BackupOutcome>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(&self.path)?;
        let entries: Vec<BackupOutcome> = serde_json::from_str(&content)?;
        Ok(entries)
    }

    /// 追加一条结果，超过上限时从最旧的开始丢弃
    pub async fn append(&self, outcome: &BackupOutcome) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let mut entries = self.load()?;
        entries.push(outcome.clone());
        if entries.len() > MAX_LOG_ENTRIES {
            let excess = entries.len() - MAX_LOG_ENTRIES;
            entries.drain(..excess);
        }

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let parent = self.path.parent().unwrap_or(Path::new("."));
        let tmp = NamedTempFile::new_in(parent)?;
        serde_json::to_writer_pretty(&tmp, &entries)?;
        tmp.persist(&self.path)
            .map_err(|e| std::io::Error::from(e.error))?;
        Ok(())
    }
}
