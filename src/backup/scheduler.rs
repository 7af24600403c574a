//! # 备份调度器
//!
//! 每个 tick 扫描启用的计划：未设置 `next_run` 的只补算时间；到期的先用条件更新
//! 把状态从非 `running` 改为 `running` 抢占执行权，再在后台执行，tick 本身不等待

use super::service::{
    BackupService, BackupType, STATUS_PENDING, STATUS_RUNNING, next_run_after,
};
use crate::error::Result;
use crate::{ldebug, lerror, linfo, lwarn, logging::{LogComponent, LogStage}};
use chrono::{DateTime, Utc};
use entity::{BackupSchedules, backup_schedules};
use sea_orm::sea_query::Expr;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, IntoActiveModel, QueryFilter, Set};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(60);

/// 一次 tick 的结果
#[derive(Debug, Default)]
pub struct TickReport {
    /// 只补算了 `next_run` 的计划
    pub scheduled: Vec<i32>,
    /// 已开始执行的计划
    pub started: Vec<i32>,
    /// 后台执行任务
    pub handles: Vec<JoinHandle<()>>,
}

impl TickReport {
    /// 等待本次 tick 启动的执行全部结束
    pub async fn join(self) {
        for handle in self.handles {
            let _ = handle.await;
        }
    }
}

pub struct BackupScheduler {
    service: Arc<BackupService>,
    tick_interval: Duration,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl BackupScheduler {
    pub fn new(service: Arc<BackupService>, tick_interval: Duration) -> Self {
        Self {
            service,
            tick_interval,
            task: Mutex::new(None),
        }
    }

    /// 启动时恢复：遗留的 `running` 改回 `pending`，缺失或已过期的 `next_run` 重新计算
    pub async fn recover(&self) -> Result<usize> {
        let db = self.service.db();
        let now = self.service.clock().now();
        let mut recovered = 0;

        for schedule in BackupSchedules::find().all(db).await? {
            let stale_status = schedule.status == STATUS_RUNNING;
            let stale_next_run = schedule.enabled && schedule.next_run.is_none_or(|at| at < now);
            if !stale_status && !stale_next_run {
                continue;
            }

            let id = schedule.id;
            let cron = schedule.schedule.clone();
            let mut active = schedule.into_active_model();
            if stale_status {
                active.status = Set(STATUS_PENDING.to_string());
            }
            if stale_next_run {
                match next_run_after(&cron, now) {
                    Ok(at) => active.next_run = Set(Some(at)),
                    Err(e) => lwarn!(
                        "system",
                        LogStage::Startup,
                        LogComponent::BackupScheduler,
                        "recover",
                        "计划的 cron 表达式无效，跳过",
                        schedule_id = id,
                        error = %e
                    ),
                }
            }
            active.updated_at = Set(now);
            active.update(db).await?;
            recovered += 1;
        }

        if recovered > 0 {
            linfo!(
                "system",
                LogStage::Startup,
                LogComponent::BackupScheduler,
                "recover",
                "已恢复备份计划状态",
                count = recovered
            );
        }
        Ok(recovered)
    }

    pub async fn tick(&self) -> Result<TickReport> {
        let db = self.service.db();
        let now = self.service.clock().now();
        let mut report = TickReport::default();

        let schedules = BackupSchedules::find()
            .filter(backup_schedules::Column::Enabled.eq(true))
            .all(db)
            .await?;

        for schedule in schedules {
            if schedule.status == STATUS_RUNNING {
                continue;
            }

            match schedule.next_run {
                None => {
                    let id = schedule.id;
                    if self.fill_next_run(schedule, now).await? {
                        report.scheduled.push(id);
                    }
                }
                Some(at) if at <= now => {
                    if self.claim(schedule.id, now).await? {
                        report.started.push(schedule.id);
                        report.handles.push(self.spawn_run(schedule.id, now));
                    } else {
                        ldebug!(
                            "system",
                            LogStage::BackgroundTask,
                            LogComponent::BackupScheduler,
                            "tick",
                            "计划已在执行，跳过",
                            schedule_id = schedule.id
                        );
                    }
                }
                Some(_) => {}
            }
        }

        Ok(report)
    }

    async fn fill_next_run(&self, schedule: backup_schedules::Model, now: DateTime<Utc>) -> Result<bool> {
        let id = schedule.id;
        match next_run_after(&schedule.schedule, now) {
            Ok(at) => {
                let mut active = schedule.into_active_model();
                active.next_run = Set(Some(at));
                active.updated_at = Set(now);
                active.update(self.service.db()).await?;
                Ok(true)
            }
            Err(e) => {
                lwarn!(
                    "system",
                    LogStage::BackgroundTask,
                    LogComponent::BackupScheduler,
                    "tick",
                    "计划的 cron 表达式无效，跳过",
                    schedule_id = id,
                    error = %e
                );
                Ok(false)
            }
        }
    }

    /// 条件更新抢占执行权；返回是否抢占成功
    async fn claim(&self, schedule_id: i32, now: DateTime<Utc>) -> Result<bool> {
        let result = BackupSchedules::update_many()
            .col_expr(backup_schedules::Column::Status, Expr::value(STATUS_RUNNING))
            .col_expr(backup_schedules::Column::LastRun, Expr::value(now))
            .col_expr(backup_schedules::Column::UpdatedAt, Expr::value(now))
            .filter(backup_schedules::Column::Id.eq(schedule_id))
            .filter(backup_schedules::Column::Status.ne(STATUS_RUNNING))
            .exec(self.service.db())
            .await?;
        Ok(result.rows_affected == 1)
    }

    fn spawn_run(&self, schedule_id: i32, started_at: DateTime<Utc>) -> JoinHandle<()> {
        let service = Arc::clone(&self.service);
        tokio::spawn(async move {
            let success = service
                .execute(Some(schedule_id), BackupType::Scheduled)
                .await
                .is_ok();
            if let Err(e) = service.complete(schedule_id, success, started_at).await {
                lerror!(
                    "system",
                    LogStage::Backup,
                    LogComponent::BackupScheduler,
                    "complete",
                    "写回计划状态失败",
                    schedule_id = schedule_id,
                    error = %e
                );
            }
        })
    }

    /// 恢复状态后启动周期 tick；重复调用无效果
    pub async fn start(self: &Arc<Self>) -> Result<()> {
        let mut guard = self.task.lock().await;
        if guard.is_some() {
            return Ok(());
        }

        self.recover().await?;

        let scheduler = Arc::clone(self);
        *guard = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(scheduler.tick_interval);
            loop {
                ticker.tick().await;
                if let Err(e) = scheduler.tick().await {
                    lerror!(
                        "system",
                        LogStage::BackgroundTask,
                        LogComponent::BackupScheduler,
                        "tick",
                        "备份调度失败",
                        error = %e
                    );
                }
            }
        }));

        linfo!(
            "system",
            LogStage::Startup,
            LogComponent::BackupScheduler,
            "start",
            "备份调度器已启动",
            interval_secs = self.tick_interval.as_secs()
        );
        Ok(())
    }

    /// 停止 tick；已开始的执行继续完成
    pub async fn stop(&self) {
        if let Some(task) = self.task.lock().await.take() {
            task.abort();
            linfo!("system", LogStage::Shutdown, LogComponent::BackupScheduler, "stop", "备份调度器已停止");
        }
    }

    pub async fn is_running(&self) -> bool {
        self.task.lock().await.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::service::{STATUS_SUCCESS, STATUS_FAILED};
    use crate::nginx::{CertificateStore, ConfigFilePublisher};
    use crate::snapshot::{ReconciliationImporter, SnapshotBuilder};
    use crate::testing::{self, fixtures};
    use crate::utils::{Clock, ManualClock};
    use chrono::TimeZone;
    use sea_orm::DatabaseConnection;
    use tempfile::TempDir;

    struct Harness {
        db: Arc<DatabaseConnection>,
        scheduler: Arc<BackupScheduler>,
        clock: Arc<ManualClock>,
        _dirs: (TempDir, TempDir),
    }

    fn t(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, h, m, 0).unwrap()
    }

    async fn harness() -> Harness {
        let db = Arc::new(testing::create_test_db().await);
        let (paths, nginx) = testing::create_nginx_layout();
        let backups = tempfile::tempdir().unwrap();
        let clock = Arc::new(ManualClock::new(t(0, 0)));

        let service = Arc::new(BackupService::new(
            db.clone(),
            Arc::new(SnapshotBuilder::new(db.clone(), paths.clone())),
            Arc::new(ReconciliationImporter::new(
                db.clone(),
                CertificateStore::new(paths.certs_dir.clone()),
            )),
            Arc::new(ConfigFilePublisher::new(
                db.clone(),
                paths,
                testing::accepting_process_control(),
            )),
            backups.path().to_path_buf(),
            clock.clone(),
        ));

        Harness {
            db,
            scheduler: Arc::new(BackupScheduler::new(service, DEFAULT_TICK_INTERVAL)),
            clock,
            _dirs: (nginx, backups),
        }
    }

    async fn reload(db: &DatabaseConnection, id: i32) -> backup_schedules::Model {
        BackupSchedules::find_by_id(id).one(db).await.unwrap().unwrap()
    }

    async fn set(db: &DatabaseConnection, id: i32, status: &str, next_run: Option<DateTime<Utc>>) {
        let mut active = reload(db, id).await.into_active_model();
        active.status = Set(status.to_string());
        active.next_run = Set(next_run);
        active.update(db).await.unwrap();
    }

    #[tokio::test]
    async fn test_unset_next_run_is_only_computed() {
        let h = harness().await;
        let schedule = fixtures::insert_schedule(&h.db, "hourly", "0 * * * *", true).await;

        let report = h.scheduler.tick().await.unwrap();
        assert_eq!(report.scheduled, vec![schedule.id]);
        assert!(report.started.is_empty());

        let schedule = reload(&h.db, schedule.id).await;
        assert_eq!(schedule.next_run, Some(t(1, 0)));
        assert_eq!(schedule.last_run, None);
    }

    #[tokio::test]
    async fn test_due_schedule_runs_and_reschedules() {
        let h = harness().await;
        let schedule = fixtures::insert_schedule(&h.db, "hourly", "0 * * * *", true).await;
        set(&h.db, schedule.id, STATUS_PENDING, Some(t(1, 0))).await;

        // 未到期
        h.clock.set(t(0, 59));
        assert!(h.scheduler.tick().await.unwrap().started.is_empty());

        h.clock.set(t(1, 0));
        let report = h.scheduler.tick().await.unwrap();
        assert_eq!(report.started, vec![schedule.id]);
        report.join().await;

        let schedule = reload(&h.db, schedule.id).await;
        assert_eq!(schedule.status, STATUS_SUCCESS);
        assert_eq!(schedule.last_run, Some(t(1, 0)));
        assert_eq!(schedule.next_run, Some(t(2, 0)));

        let files = entity::BackupFiles::find().all(h.db.as_ref()).await.unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].backup_type, "scheduled");
        assert_eq!(files[0].schedule_id, Some(schedule.id));
    }

    #[tokio::test]
    async fn test_running_schedule_is_not_started_again() {
        let h = harness().await;
        let schedule = fixtures::insert_schedule(&h.db, "s", "* * * * *", true).await;
        set(&h.db, schedule.id, STATUS_RUNNING, Some(t(0, 0))).await;

        let report = h.scheduler.tick().await.unwrap();
        assert!(report.started.is_empty());
        assert!(!h.scheduler.claim(schedule.id, h.clock.now()).await.unwrap());
    }

    #[tokio::test]
    async fn test_claim_is_exclusive() {
        let h = harness().await;
        let schedule = fixtures::insert_schedule(&h.db, "s", "* * * * *", true).await;

        assert!(h.scheduler.claim(schedule.id, h.clock.now()).await.unwrap());
        assert!(!h.scheduler.claim(schedule.id, h.clock.now()).await.unwrap());
        assert_eq!(reload(&h.db, schedule.id).await.status, STATUS_RUNNING);
    }

    #[tokio::test]
    async fn test_disabled_and_invalid_schedules_are_skipped() {
        let h = harness().await;
        let disabled = fixtures::insert_schedule(&h.db, "off", "* * * * *", false).await;
        let invalid = fixtures::insert_schedule(&h.db, "bad", "not a cron", true).await;

        let report = h.scheduler.tick().await.unwrap();
        assert!(report.scheduled.is_empty());
        assert!(report.started.is_empty());
        assert_eq!(reload(&h.db, disabled.id).await.next_run, None);
        assert_eq!(reload(&h.db, invalid.id).await.next_run, None);
    }

    #[tokio::test]
    async fn test_recover_resets_interrupted_runs() {
        let h = harness().await;
        let interrupted = fixtures::insert_schedule(&h.db, "a", "0 * * * *", true).await;
        let overdue = fixtures::insert_schedule(&h.db, "b", "30 * * * *", true).await;
        let future = fixtures::insert_schedule(&h.db, "c", "0 * * * *", true).await;
        let failed = fixtures::insert_schedule(&h.db, "d", "0 * * * *", false).await;

        h.clock.set(t(5, 10));
        set(&h.db, interrupted.id, STATUS_RUNNING, Some(t(6, 0))).await;
        set(&h.db, overdue.id, STATUS_PENDING, Some(t(3, 30))).await;
        set(&h.db, future.id, STATUS_PENDING, Some(t(6, 0))).await;
        set(&h.db, failed.id, STATUS_FAILED, None).await;

        assert_eq!(h.scheduler.recover().await.unwrap(), 2);

        let interrupted = reload(&h.db, interrupted.id).await;
        assert_eq!(interrupted.status, STATUS_PENDING);
        assert_eq!(interrupted.next_run, Some(t(6, 0)));
        assert_eq!(reload(&h.db, overdue.id).await.next_run, Some(t(5, 30)));
        assert_eq!(reload(&h.db, future.id).await.next_run, Some(t(6, 0)));
        assert_eq!(reload(&h.db, failed.id).await.next_run, None);
    }

    #[tokio::test]
    async fn test_start_recovers_and_stop() {
        let h = harness().await;
        let schedule = fixtures::insert_schedule(&h.db, "a", "0 * * * *", true).await;
        set(&h.db, schedule.id, STATUS_RUNNING, Some(t(1, 0))).await;

        h.scheduler.start().await.unwrap();
        assert!(h.scheduler.is_running().await);
        assert_eq!(reload(&h.db, schedule.id).await.status, STATUS_PENDING);

        h.scheduler.stop().await;
        assert!(!h.scheduler.is_running().await);
    }
}
