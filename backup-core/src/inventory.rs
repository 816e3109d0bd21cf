use crate::error::{BackupError, Result};
use crate::model::DeviceTarget;
use std::path::{Path, PathBuf};

/// 路由器清单，外部维护的 JSON 文件，这里只做读取
#[derive(Debug, Clone)]
pub struct Inventory {
    path: PathBuf,
}

impl Inventory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 读取全部路由器，文件不存在时返回空清单
    pub fn load(&self) -> Result<Vec<DeviceTarget>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(&self.path)?;
        let routers: Vec<DeviceTarget> = serde_json::from_str(&content)?;
        Ok(routers)
    }

    /// 按 ID 查找一台路由器
    pub fn find(&self, router_id: &str) -> Result<DeviceTarget> {
        self.load()?
            .into_iter()
            .find(|r| r.id == router_id)
            .ok_or_else(|| BackupError::RouterNotFound(router_id.to_string()))
    }
}
