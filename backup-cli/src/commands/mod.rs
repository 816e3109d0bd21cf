// 各子命令的实现
mod backup;
mod daemon;
mod history;

pub use backup::run_backup;
pub use daemon::run_daemon;
pub use history::run_history;
pub use test::run_test;
