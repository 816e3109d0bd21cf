use crate::project_info::{metadata, version_info};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// MikroTik Backup CLI - 路由器配置备份与调度工具
#[derive(Parser)]
#[command(name = "backup-cli")]
#[command(about = metadata::PROJECT_DESCRIPTION)]
#[command(version = version_info::CLI_VERSION)]
#[command(long_about = metadata::display::DESCRIPTION_LONG)]
#[command(author = metadata::PROJECT_AUTHORS)]
pub struct Cli {
    /// 配置文件路径（不指定时按 config.toml 等候选文件智能查找）
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// 详细输出
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// 首次使用时初始化，创建配置文件和目录结构
    Init {
        /// 如果配置文件已存在，强制覆盖
        #[arg(long)]
        force: bool,
    },
    /// 手动创建备份
    Backup {
        /// 路由器 ID（不指定则备份清单里的全部路由器）
        router_id: Option<String>,
    },
    /// 测试到路由器的管理连接
    Test {
        /// 路由器 ID
        router_id: String,
    },
    /// 显示最近的备份历史
    History {
        /// 显示的条数
        #[arg(long, default_value = "20", help = "显示最近多少条记录")]
        limit: usize,
    },
    /// 常驻运行，按设置执行定时备份
    Run,
}
