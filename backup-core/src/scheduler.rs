//! 定时备份任务
//!
//! 固定标识下最多存在一个周期任务，`reconfigure` 是原子的
//! 先撤销再安装，设置变更绝不会留下两个并存的任务。
//! 撤销只作用于计时循环：触发体在独立任务里执行，
//! 进行中的触发总是跑到自然结束

use crate::constants::scheduler::JOB_ID;
use chrono::{NaiveDateTime, NaiveTime};
use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// 调度模式：固定间隔或每日定点
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleMode {
    Interval { hours: u64 },
    Daily { hour: u32, minute: u32 },
}

/// 从设置解析出的调度描述
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleDescriptor {
    pub enabled: bool,
    pub mode: ScheduleMode,
}

/// 任务体工厂：每次触发生成一个新的 future
pub type Job = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

struct InstalledJob {
    descriptor: ScheduleDescriptor,
    handle: JoinHandle<()>,
}

/// 进程级唯一的定时器，显式构造后按句柄传递
pub struct JobScheduler {
    installed: Mutex<Option<InstalledJob>>,
    task: Job,
    /// 单飞保护：上一次触发还没结束时跳过本次触发
    flight: Arc<Mutex<()>>,
}

impl JobScheduler {
    pub fn new(task: Job) -> Self {
        Self {
            installed: Mutex::new(None),
            task,
            flight: Arc::new(Mutex::new(())),
        }
    }

    /// 当前安装的任务描述，没有任务时为 None
    pub async fn descriptor(&self) -> Option<ScheduleDescriptor> {
        self.installed.lock().await.as_ref().map(|j| j.descriptor)
    }

    /// 按新的描述重建任务：无条件撤销旧任务，再视 enabled 决定是否安装
    pub async fn reconfigure(&self, descriptor: ScheduleDescriptor) {
        let mut slot = self.installed.lock().await;

        if let Some(old) = slot.take() {
            old.handle.abort();
        }

        if !descriptor.enabled {
            info!("[{}] 定时备份已禁用", JOB_ID);
            return;
        }

        match descriptor.mode {
            ScheduleMode::Interval { hours } => {
                info!("[{}] 每 {} 小时执行一次备份", JOB_ID, hours);
            }
            ScheduleMode::Daily { hour, minute } => {
                info!("[{}] 每天 {:02}:{:02} 执行备份", JOB_ID, hour, minute);
            }
        }

        let task = self.task.clone();
        let flight = self.flight.clone();
        let mode = descriptor.mode;
        let handle = tokio::spawn(async move {
            loop {
                let wait = match mode {
                    ScheduleMode::Interval { hours } => {
                        Duration::from_secs(hours.saturating_mul(3600))
                    }
                    ScheduleMode::Daily { hour, minute } => {
                        until_next_daily(chrono::Local::now().naive_local(), hour, minute)
                    }
                };
                debug!("[{}] 下次触发在 {:?} 之后", JOB_ID, wait);
                tokio::time::sleep(wait).await;

                // 触发体放进独立任务：撤销计时循环不会打断进行中的备份，
                // 单飞守卫随任务结束释放
                match flight.clone().try_lock_owned() {
                    Ok(guard) => {
                        info!("[{}] 定时备份触发", JOB_ID);
                        let task = task.clone();
                        tokio::spawn(async move {
                            task().await;
                            drop(guard);
                        });
                    }
                    Err(_) => {
                        warn!("[{}] 上一次触发尚未结束，跳过本次", JOB_ID);
                    }
                }
            }
        });

        *slot = Some(InstalledJob { descriptor, handle });
    }

    /// 停止定时任务，并等待进行中的触发结束（进程退出前调用）
    pub async fn shutdown(&self) {
        if let Some(old) = self.installed.lock().await.take() {
            old.handle.abort();
        }
        let _inflight = self.flight.lock().await;
    }
}

/// 距离下一个每日 HH:MM 的等待时长；正好等于当前时刻时取明天
fn until_next_daily(now: NaiveDateTime, hour: u32, minute: u32) -> Duration {
    let time = NaiveTime::from_hms_opt(hour, minute, 0)
        .unwrap_or_else(|| NaiveTime::from_hms_opt(0, 0, 0).unwrap());
    let mut next = now.date().and_time(time);
    if next <= now {
        next += chrono::Duration::days(1);
    }
    (next - now).to_std().unwrap_or(Duration::from_secs(60))
}
