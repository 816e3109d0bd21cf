use backup_core::config::AppConfig;
use backup_core::error::Result;
use std::path::Path;
use tracing::{info, warn};

/// 运行独立的初始化流程
pub async fn run_init(force: bool) -> Result<()> {
    info!("📡 MikroTik 备份工具初始化");
    info!("==========================");

    // 检查是否已经初始化过
    if !force && Path::new("config.toml").exists() {
        warn!("⚠️  检测到已存在的配置文件");
        info!("如果您要重新初始化，请使用 --force 参数");
        info!("示例: backup-cli init --force");
        return Ok(());
    }

    info!("📋 步骤 1: 创建配置文件");
    let config = AppConfig::default();
    config.save_to_file("config.toml")?;
    info!("   ✅ 创建配置文件: config.toml");

    info!("📋 步骤 2: 创建目录结构");
    config.ensure_dirs()?;
    info!("   ✅ 创建目录结构:");
    info!(
        "      - {}/        (清单、设置与历史记录)",
        config.storage.data_dir
    );
    info!("      - {}/     (本地备份文件)", config.storage.backup_dir);
    info!(
        "      - {}/ (Google Drive 凭据)",
        config.storage.credentials_dir
    );

    // 创建空清单，等待用户填入路由器
    let routers_file = config.routers_file();
    if force || !routers_file.exists() {
        std::fs::write(&routers_file, "[]\n")?;
        info!("   ✅ 创建路由器清单: {}", routers_file.display());
    }

    info!("🎉 初始化完成！");
    info!("");
    info!("📝 接下来的步骤:");
    info!(
        "   1️⃣  编辑 {} 添加路由器（id、name、ip、username、password）",
        config.routers_file().display()
    );
    info!(
        "   2️⃣  将 Google Drive 授权文件放到 {}（或设置 GOOGLE_TOKEN 环境变量）",
        config.token_file().display()
    );
    info!("   3️⃣  运行 'backup-cli backup' 手动备份全部路由器");
    info!("   4️⃣  运行 'backup-cli run' 启动定时备份服务");

    Ok(())
}
