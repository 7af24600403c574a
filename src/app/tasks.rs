//! # 后台任务集合
//!
//! 按节点角色注册后台任务：主节点运行离线检查，从节点运行配置拉取，
//! 两者都可运行备份调度

use crate::app::context::AppContext;
use crate::app::task_scheduler::{ScheduledTask, TaskScheduler};
use crate::error::Result;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskType {
    /// 从节点离线检查
    NodeHealthMonitor,
    /// 备份计划调度
    BackupScheduler,
    /// 从主节点拉取配置
    SlaveSync,
}

impl TaskType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NodeHealthMonitor => "node_health_monitor",
            Self::BackupScheduler => "backup_scheduler",
            Self::SlaveSync => "slave_sync",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct AppTasks {
    scheduler: Arc<TaskScheduler>,
}

impl AppTasks {
    pub async fn initialize(context: &AppContext) -> Result<Arc<Self>> {
        let scheduler = Arc::new(TaskScheduler::new());
        let mut tasks = Vec::new();

        if !context.config.is_slave() {
            let monitor = context.monitor.clone();
            let stop = monitor.clone();
            tasks.push(
                ScheduledTask::builder(TaskType::NodeHealthMonitor)
                    .on_start(move || {
                        let monitor = monitor.clone();
                        async move {
                            monitor.start().await;
                            Ok(())
                        }
                    })
                    .on_stop(move || {
                        let monitor = stop.clone();
                        async move {
                            monitor.stop().await;
                            Ok(())
                        }
                    })
                    .build()?,
            );
        }

        if let Some(slave_sync) = &context.slave_sync {
            let task = slave_sync.clone();
            let stop = slave_sync.clone();
            tasks.push(
                ScheduledTask::builder(TaskType::SlaveSync)
                    .on_start(move || {
                        let task = task.clone();
                        async move {
                            task.start().await;
                            Ok(())
                        }
                    })
                    .on_stop(move || {
                        let task = stop.clone();
                        async move {
                            task.stop().await;
                            Ok(())
                        }
                    })
                    .build()?,
            );
        }

        if context.config.backup.scheduler_enabled {
            let backup = context.backup_scheduler.clone();
            let stop = backup.clone();
            tasks.push(
                ScheduledTask::builder(TaskType::BackupScheduler)
                    .on_start(move || {
                        let backup = backup.clone();
                        async move { backup.start().await }
                    })
                    .on_stop(move || {
                        let backup = stop.clone();
                        async move {
                            backup.stop().await;
                            Ok(())
                        }
                    })
                    .build()?,
            );
        }

        scheduler.register_many(tasks).await;
        Ok(Arc::new(Self { scheduler }))
    }

    #[must_use]
    pub fn scheduler(&self) -> Arc<TaskScheduler> {
        Arc::clone(&self.scheduler)
    }

    pub async fn start_all(&self) -> Result<()> {
        self.scheduler.start_all().await
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.scheduler.shutdown().await
    }
}
