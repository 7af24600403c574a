//! # 备份
//!
//! cron 计划、备份文件与恢复

pub mod cron;
pub mod scheduler;
pub mod service;

pub use cron::CronExpression;
pub use scheduler::{BackupScheduler, TickReport};
pub use service::{
    BackupService, BackupType, CreateSchedule, RestoreResult, UpdateSchedule, backup_filename,
    next_run_after,
};
