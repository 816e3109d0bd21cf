use crate::app::CliApp;
use backup_core::error::Result;
use backup_core::model::Trigger;
use backup_core::scheduler::{Job, JobScheduler};
use futures::FutureExt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// 设置文件的重读周期：外部修改 settings.json 后最多等这么久生效
const SETTINGS_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// 常驻运行定时备份，直到收到 Ctrl+C
pub async fn run_daemon(app: &CliApp) -> Result<()> {
    let service = app.service.clone();
    let task: Job = Arc::new(move || {
        let service = service.clone();
        async move {
            service.backup_all(Trigger::Scheduler).await;
        }
        .boxed()
    });
    let scheduler = JobScheduler::new(task);

    let mut current = app.service.settings().load()?.schedule();
    scheduler.reconfigure(current).await;
    if !current.enabled {
        info!("💤 定时备份当前是禁用状态，修改设置后会自动生效");
    }
    info!("🚀 定时备份服务已启动，按 Ctrl+C 退出");

    let mut poll = tokio::time::interval(SETTINGS_POLL_INTERVAL);
    poll.tick().await; // 第一次 tick 立即返回，跳过

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = poll.tick() => {
                match app.service.settings().load() {
                    Ok(settings) => {
                        let descriptor = settings.schedule();
                        if descriptor != current {
                            info!("🔁 调度设置已变更，重新安装定时任务");
                            scheduler.reconfigure(descriptor).await;
                            current = descriptor;
                        }
                    }
                    Err(e) => warn!("设置读取失败，沿用当前调度: {}", e),
                }
            }
        }
    }

    info!("⏹️  正在停止定时备份服务...");
    scheduler.shutdown().await;
    Ok(())
}
