use crate::app::CliApp;
use backup_core::error::Result;
use tracing::info;

/// 显示最近的备份历史，最新的在前
///
/// 历史列表是用户界面输出，走标准输出而不是日志
pub async fn run_history(app: &CliApp, limit: usize) -> Result<()> {
    let entries = app.service.recorder().load()?;
    if entries.is_empty() {
        info!("暂无备份历史");
        return Ok(());
    }

    let shown = entries.len().min(limit);
    println!("最近 {shown} 条备份记录（共 {} 条）:", entries.len());
    println!("{}", "-".repeat(72));

    for entry in entries.iter().rev().take(limit) {
        let status = if entry.success { "✅" } else { "❌" };
        let uploaded = entry
            .drive_files
            .as_ref()
            .map(|files| format!(" ☁️ x{}", files.len()))
            .unwrap_or_default();
        println!(
            "{} {} [{:>10}] {} - {}{}",
            status,
            entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
            entry.triggered_by.as_str(),
            entry.router_name,
            entry.message,
            uploaded,
        );
    }

    Ok(())
}
