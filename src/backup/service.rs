//! # 备份服务
//!
//! 备份计划的增删改查、备份文件的写入与记录，以及从备份恢复。
//! 计划的 `next_run` 在创建、启用或修改 cron 时重新计算

use super::cron::CronExpression;
use crate::error::{Context, FleetError, Result};
use crate::nginx::ConfigFilePublisher;
use crate::snapshot::model::BackupDomain;
use crate::snapshot::{BackupSnapshot, ChangeReport, ImportPlan, ReconciliationImporter, SnapshotBuilder};
use crate::utils::SharedClock;
use crate::{ensure_valid, linfo, lwarn, logging::{LogComponent, LogStage}};
use chrono::{DateTime, Utc};
use entity::{BackupFiles, BackupSchedules, backup_files, backup_schedules};
use sea_orm::{
    ActiveModelTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const STATUS_PENDING: &str = "pending";
pub const STATUS_RUNNING: &str = "running";
pub const STATUS_SUCCESS: &str = "success";
pub const STATUS_FAILED: &str = "failed";

/// 备份触发方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupType {
    Manual,
    Scheduled,
}

impl BackupType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Scheduled => "scheduled",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSchedule {
    pub name: String,
    pub schedule: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

const fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSchedule {
    pub name: Option<String>,
    pub schedule: Option<String>,
    pub enabled: Option<bool>,
}

/// 恢复结果
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreResult {
    pub report: ChangeReport,
    /// 写入的 vhost 文件数
    pub published: usize,
    /// nginx 是否重载成功；为 false 时需要手动重载
    pub reloaded: bool,
}

/// 计算下一次运行时间
pub fn next_run_after(expression: &str, after: DateTime<Utc>) -> Result<DateTime<Utc>> {
    CronExpression::parse(expression)?
        .next_after(after)
        .ok_or_else(|| FleetError::schedule(format!("cron 表达式没有可达的运行时间: {expression}")))
}

/// 备份文件名：`backup-<YYYYMMDD-HHMMSS>-<8 位十六进制>.json`
#[must_use]
pub fn backup_filename(at: DateTime<Utc>) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("backup-{}-{}.json", at.format("%Y%m%d-%H%M%S"), &suffix[..8])
}

pub struct BackupService {
    db: Arc<DatabaseConnection>,
    builder: Arc<SnapshotBuilder>,
    importer: Arc<ReconciliationImporter>,
    publisher: Arc<ConfigFilePublisher>,
    directory: PathBuf,
    clock: SharedClock,
}

impl BackupService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        builder: Arc<SnapshotBuilder>,
        importer: Arc<ReconciliationImporter>,
        publisher: Arc<ConfigFilePublisher>,
        directory: impl Into<PathBuf>,
        clock: SharedClock,
    ) -> Self {
        Self {
            db,
            builder,
            importer,
            publisher,
            directory: directory.into(),
            clock,
        }
    }

    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub(crate) fn clock(&self) -> &SharedClock {
        &self.clock
    }

    pub(crate) fn db(&self) -> &DatabaseConnection {
        self.db.as_ref()
    }

    // ---- 计划管理 ----

    pub async fn list_schedules(&self) -> Result<Vec<backup_schedules::Model>> {
        Ok(BackupSchedules::find()
            .order_by_asc(backup_schedules::Column::Id)
            .all(self.db.as_ref())
            .await?)
    }

    pub async fn get_schedule(&self, id: i32) -> Result<backup_schedules::Model> {
        BackupSchedules::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| FleetError::not_found("backup_schedule", id))
    }

    pub async fn create_schedule(&self, request: CreateSchedule) -> Result<backup_schedules::Model> {
        ensure_valid!(!request.name.trim().is_empty(), "计划名称不能为空");
        let now = self.clock.now();
        let next_run = next_run_after(&request.schedule, now)?;

        let schedule = backup_schedules::ActiveModel {
            name: Set(request.name),
            schedule: Set(request.schedule.trim().to_string()),
            enabled: Set(request.enabled),
            status: Set(STATUS_PENDING.to_string()),
            last_run: Set(None),
            next_run: Set(request.enabled.then_some(next_run)),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(self.db.as_ref())
        .await?;

        linfo!(
            "system",
            LogStage::Backup,
            LogComponent::BackupService,
            "create_schedule",
            "备份计划已创建",
            schedule_id = schedule.id,
            cron = %schedule.schedule
        );
        Ok(schedule)
    }

    pub async fn update_schedule(&self, id: i32, request: UpdateSchedule) -> Result<backup_schedules::Model> {
        let existing = self.get_schedule(id).await?;
        let now = self.clock.now();

        let cron_changed = request
            .schedule
            .as_deref()
            .is_some_and(|s| s.trim() != existing.schedule);
        let enabling = request.enabled == Some(true) && !existing.enabled;
        let enabled = request.enabled.unwrap_or(existing.enabled);
        let cron = request
            .schedule
            .as_deref()
            .map_or_else(|| existing.schedule.clone(), |s| s.trim().to_string());

        let mut active = existing.into_active_model();
        if let Some(name) = request.name {
            ensure_valid!(!name.trim().is_empty(), "计划名称不能为空");
            active.name = Set(name);
        }
        if cron_changed || enabling {
            let next_run = next_run_after(&cron, now)?;
            active.schedule = Set(cron);
            active.next_run = Set(enabled.then_some(next_run));
        }
        active.enabled = Set(enabled);
        active.updated_at = Set(now);

        Ok(active.update(self.db.as_ref()).await?)
    }

    pub async fn delete_schedule(&self, id: i32) -> Result<()> {
        let result = BackupSchedules::delete_by_id(id).exec(self.db.as_ref()).await?;
        if result.rows_affected == 0 {
            return Err(FleetError::not_found("backup_schedule", id));
        }
        Ok(())
    }

    // ---- 执行 ----

    /// 构建备份快照并写入文件，记录 `backup_files`
    pub async fn execute(&self, schedule_id: Option<i32>, backup_type: BackupType) -> Result<backup_files::Model> {
        let started_at = self.clock.now();
        let filename = backup_filename(started_at);
        let filepath = self.directory.join(&filename);

        match self.write_backup(&filepath).await {
            Ok((size, snapshot)) => {
                let metadata = serde_json::to_string(&snapshot.counts())?;
                let record = self
                    .record_file(schedule_id, &filename, &filepath, size, STATUS_SUCCESS, backup_type, Some(metadata))
                    .await?;
                linfo!(
                    "system",
                    LogStage::Backup,
                    LogComponent::BackupService,
                    "execute",
                    "备份已完成",
                    file = %filename,
                    size = size,
                    backup_type = backup_type.as_str()
                );
                Ok(record)
            }
            Err(e) => {
                lwarn!(
                    "system",
                    LogStage::Backup,
                    LogComponent::BackupService,
                    "execute",
                    "备份失败",
                    file = %filename,
                    error = %e
                );
                self.record_file(schedule_id, &filename, &filepath, 0, STATUS_FAILED, backup_type, None)
                    .await?;
                Err(e)
            }
        }
    }

    async fn write_backup(&self, filepath: &Path) -> Result<(i64, BackupSnapshot)> {
        let snapshot = self.builder.build_backup_snapshot().await?;
        let bytes = serde_json::to_vec_pretty(&snapshot)?;

        tokio::fs::create_dir_all(&self.directory)
            .await
            .map_err(|e| FleetError::io(format!("创建备份目录失败: {}", self.directory.display()), e))?;
        tokio::fs::write(filepath, &bytes)
            .await
            .map_err(|e| FleetError::io(format!("写入备份文件失败: {}", filepath.display()), e))?;

        let size = i64::try_from(bytes.len()).unwrap_or(i64::MAX);
        Ok((size, snapshot))
    }

    #[allow(clippy::too_many_arguments)]
    async fn record_file(
        &self,
        schedule_id: Option<i32>,
        filename: &str,
        filepath: &Path,
        size: i64,
        status: &str,
        backup_type: BackupType,
        metadata: Option<String>,
    ) -> Result<backup_files::Model> {
        Ok(backup_files::ActiveModel {
            schedule_id: Set(schedule_id),
            filename: Set(filename.to_string()),
            filepath: Set(filepath.to_string_lossy().into_owned()),
            size: Set(size),
            status: Set(status.to_string()),
            backup_type: Set(backup_type.as_str().to_string()),
            metadata: Set(metadata),
            created_at: Set(self.clock.now()),
            ..Default::default()
        }
        .insert(self.db.as_ref())
        .await?)
    }

    /// 执行计划并写回状态；不检查 `running`
    pub async fn run_schedule(&self, schedule_id: i32, backup_type: BackupType) -> Result<backup_files::Model> {
        let started_at = self.clock.now();
        let result = self.execute(Some(schedule_id), backup_type).await;
        self.complete(schedule_id, result.is_ok(), started_at).await?;
        result
    }

    /// 手动触发
    pub async fn run_now(&self, schedule_id: i32) -> Result<backup_files::Model> {
        self.get_schedule(schedule_id).await?;
        self.run_schedule(schedule_id, BackupType::Manual).await
    }

    /// 写回执行结果；仅启用的计划从完成时间起重新计算 `next_run`
    pub(crate) async fn complete(&self, schedule_id: i32, success: bool, started_at: DateTime<Utc>) -> Result<()> {
        let Some(schedule) = BackupSchedules::find_by_id(schedule_id)
            .one(self.db.as_ref())
            .await?
        else {
            // 执行期间计划被删除
            return Ok(());
        };

        let now = self.clock.now();
        let next_run = if schedule.enabled {
            match next_run_after(&schedule.schedule, now) {
                Ok(at) => Some(at),
                Err(e) => {
                    lwarn!(
                        "system",
                        LogStage::Backup,
                        LogComponent::BackupService,
                        "complete",
                        "无法计算下一次运行时间",
                        schedule_id = schedule_id,
                        error = %e
                    );
                    None
                }
            }
        } else {
            schedule.next_run
        };

        let mut active = schedule.into_active_model();
        active.status = Set(if success { STATUS_SUCCESS } else { STATUS_FAILED }.to_string());
        active.last_run = Set(Some(started_at));
        active.next_run = Set(next_run);
        active.updated_at = Set(now);
        active.update(self.db.as_ref()).await?;
        Ok(())
    }

    // ---- 导出与恢复 ----

    pub async fn export(&self) -> Result<BackupSnapshot> {
        self.builder.build_backup_snapshot().await
    }

    /// 导入备份并重新发布 vhost；有原始 vhost 内容时按原样写回
    pub async fn import(&self, value: &Value) -> Result<RestoreResult> {
        let plan = ImportPlan::from_backup_value(value)?;
        let report = self.importer.apply(plan).await;

        let domains: Vec<BackupDomain> = value
            .get("domains")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| serde_json::from_value(item.clone()).ok())
                    .collect()
            })
            .unwrap_or_default();

        let mut published = 0;
        for domain in &domains {
            let name = &domain.domain.name;
            let result = match &domain.files {
                Some(files) => {
                    self.publisher
                        .write_vhost(name, &files.vhost_config, domain.domain.status == "active")
                        .await
                }
                None => self.publisher.publish(name).await,
            };
            match result {
                Ok(_) => published += 1,
                Err(e) => lwarn!(
                    "system",
                    LogStage::Backup,
                    LogComponent::BackupService,
                    "import",
                    "恢复 vhost 失败",
                    domain = %name,
                    error = %e
                ),
            }
        }

        let reloaded = self.publisher.reload().await;
        if !reloaded {
            lwarn!(
                "system",
                LogStage::Backup,
                LogComponent::BackupService,
                "import",
                "备份已恢复但 nginx 未能重载，需要手动重载"
            );
        }

        linfo!(
            "system",
            LogStage::Backup,
            LogComponent::BackupService,
            "import",
            "备份已恢复",
            changes = report.total_changes(),
            failures = report.failures().len(),
            published = published
        );

        Ok(RestoreResult {
            report,
            published,
            reloaded,
        })
    }

    // ---- 备份文件 ----

    pub async fn list_files(&self) -> Result<Vec<backup_files::Model>> {
        Ok(BackupFiles::find()
            .order_by_desc(backup_files::Column::CreatedAt)
            .order_by_desc(backup_files::Column::Id)
            .all(self.db.as_ref())
            .await?)
    }

    pub async fn get_file(&self, id: i32) -> Result<backup_files::Model> {
        BackupFiles::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| FleetError::not_found("backup_file", id))
    }

    /// 删除记录与磁盘文件；文件已不存在时只删除记录
    pub async fn delete_file(&self, id: i32) -> Result<()> {
        let file = self.get_file(id).await?;
        match tokio::fs::remove_file(&file.filepath).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(FleetError::io(format!("删除备份文件失败: {}", file.filepath), e)),
        }
        BackupFiles::delete_by_id(id).exec(self.db.as_ref()).await?;
        Ok(())
    }

    /// 从已记录的备份文件恢复
    pub async fn restore_file(&self, id: i32) -> Result<RestoreResult> {
        let file = self.get_file(id).await?;
        let bytes = tokio::fs::read(&file.filepath)
            .await
            .map_err(|e| FleetError::io(format!("读取备份文件失败: {}", file.filepath), e))?;
        let value: Value = serde_json::from_slice(&bytes).context("备份文件不是有效的 JSON")?;
        self.import(&value).await
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::nginx::process::MockProcessControl;
    use crate::nginx::{CertificateStore, NginxPaths};
    use crate::testing::{self, fixtures};
    use crate::utils::{Clock, ManualClock};
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    struct Harness {
        db: Arc<DatabaseConnection>,
        service: BackupService,
        paths: NginxPaths,
        clock: Arc<ManualClock>,
        _nginx: TempDir,
        _backups: TempDir,
    }

    async fn harness(reload_ok: bool) -> Harness {
        let db = Arc::new(testing::create_test_db().await);
        let (paths, nginx) = testing::create_nginx_layout();
        let backups = tempfile::tempdir().unwrap();
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()));

        let mut process = MockProcessControl::new();
        process.expect_test_config().returning(move || {
            if reload_ok {
                Ok(())
            } else {
                Err(FleetError::external_process("nginx -t failed"))
            }
        });
        process.expect_reload().returning(|| Ok(()));

        let service = BackupService::new(
            db.clone(),
            Arc::new(SnapshotBuilder::new(db.clone(), paths.clone())),
            Arc::new(ReconciliationImporter::new(
                db.clone(),
                CertificateStore::new(paths.certs_dir.clone()),
            )),
            Arc::new(ConfigFilePublisher::new(db.clone(), paths.clone(), Arc::new(process))),
            backups.path().join("backups"),
            clock.clone(),
        );

        Harness {
            db,
            service,
            paths,
            clock,
            _nginx: nginx,
            _backups: backups,
        }
    }

    fn create(name: &str, cron: &str, enabled: bool) -> CreateSchedule {
        CreateSchedule {
            name: name.to_string(),
            schedule: cron.to_string(),
            enabled,
        }
    }

    #[test]
    fn test_backup_filename_format() {
        let at = Utc.with_ymd_and_hms(2024, 3, 5, 14, 7, 9).unwrap();
        let name = backup_filename(at);
        assert!(name.starts_with("backup-20240305-140709-"));
        assert!(name.ends_with(".json"));
        let suffix = &name["backup-20240305-140709-".len()..name.len() - ".json".len()];
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn test_create_schedule_computes_next_run() {
        let h = harness(true).await;
        let schedule = h.service.create_schedule(create("hourly", "0 * * * *", true)).await.unwrap();
        assert_eq!(schedule.status, STATUS_PENDING);
        assert_eq!(schedule.next_run, Some(Utc.with_ymd_and_hms(2024, 1, 1, 1, 0, 0).unwrap()));

        let disabled = h.service.create_schedule(create("off", "0 * * * *", false)).await.unwrap();
        assert_eq!(disabled.next_run, None);

        let err = h.service.create_schedule(create("bad", "61 * * * *", true)).await.unwrap_err();
        assert!(matches!(err, FleetError::Schedule { .. }));
    }

    #[tokio::test]
    async fn test_update_recomputes_on_cron_change_and_enable() {
        let h = harness(true).await;
        let schedule = h.service.create_schedule(create("s", "0 * * * *", false)).await.unwrap();

        h.clock.advance(chrono::Duration::minutes(10));
        let enabled = h
            .service
            .update_schedule(
                schedule.id,
                UpdateSchedule {
                    enabled: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(enabled.next_run, Some(Utc.with_ymd_and_hms(2024, 1, 1, 1, 0, 0).unwrap()));

        let changed = h
            .service
            .update_schedule(
                schedule.id,
                UpdateSchedule {
                    schedule: Some("30 * * * *".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(changed.next_run, Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 30, 0).unwrap()));

        let renamed = h
            .service
            .update_schedule(
                schedule.id,
                UpdateSchedule {
                    name: Some("renamed".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(renamed.next_run, changed.next_run);
        assert_eq!(renamed.name, "renamed");
    }

    #[tokio::test]
    async fn test_run_now_writes_file_and_record() {
        let h = harness(true).await;
        fixtures::insert_domain(&h.db, "example.com", false).await;
        fixtures::insert_acl_rule(&h.db, "block-bad", "10.0.0.0/8").await;
        let schedule = h.service.create_schedule(create("s", "0 * * * *", true)).await.unwrap();

        let file = h.service.run_now(schedule.id).await.unwrap();
        assert_eq!(file.status, STATUS_SUCCESS);
        assert_eq!(file.backup_type, "manual");
        assert_eq!(file.schedule_id, Some(schedule.id));
        assert!(file.filename.starts_with("backup-20240101-000000-"));

        let on_disk = std::fs::metadata(&file.filepath).unwrap();
        assert_eq!(i64::try_from(on_disk.len()).unwrap(), file.size);

        let counts: crate::snapshot::SnapshotCounts =
            serde_json::from_str(file.metadata.as_deref().unwrap()).unwrap();
        assert_eq!(counts.domains, 1);
        assert_eq!(counts.acl_rules, 1);

        let schedule = h.service.get_schedule(schedule.id).await.unwrap();
        assert_eq!(schedule.status, STATUS_SUCCESS);
        assert_eq!(schedule.last_run, Some(h.clock.now()));
        assert_eq!(schedule.next_run, Some(Utc.with_ymd_and_hms(2024, 1, 1, 1, 0, 0).unwrap()));

        assert_eq!(h.service.list_files().await.unwrap().len(), 1);
        h.service.delete_file(file.id).await.unwrap();
        assert!(!Path::new(&file.filepath).exists());
        assert!(h.service.list_files().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_import_publishes_vhosts_and_reports_reload() {
        let source = harness(true).await;
        let domain = fixtures::insert_domain(&source.db, "example.com", false).await;
        fixtures::insert_upstream(&source.db, domain.id, "10.0.0.1", 8080).await;
        let backup = source.service.export().await.unwrap();
        let value = serde_json::to_value(&backup).unwrap();

        let target = harness(false).await;
        let result = target.service.import(&value).await.unwrap();
        assert!(!result.reloaded);
        assert_eq!(result.published, 1);
        assert!(result.report.total_changes() >= 2);

        let vhost = std::fs::read_to_string(target.paths.available_file("example.com")).unwrap();
        assert!(vhost.contains("server 10.0.0.1:8080"));
        assert!(target.paths.enabled_link("example.com").exists());
    }

    #[tokio::test]
    async fn test_import_rejects_missing_arrays() {
        let h = harness(true).await;
        let err = h.service.import(&serde_json::json!({"domains": []})).await.unwrap_err();
        assert!(matches!(err, FleetError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_run_now_on_disabled_schedule_keeps_next_run_empty() {
        let h = harness(true).await;
        let schedule = h.service.create_schedule(create("off", "0 * * * *", false)).await.unwrap();
        assert_eq!(schedule.next_run, None);

        h.service.run_now(schedule.id).await.unwrap();

        let schedule = h.service.get_schedule(schedule.id).await.unwrap();
        assert_eq!(schedule.status, STATUS_SUCCESS);
        assert_eq!(schedule.last_run, Some(h.clock.now()));
        assert_eq!(schedule.next_run, None);
    }
}
