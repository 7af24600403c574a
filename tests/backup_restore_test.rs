//! # 备份、恢复与计划调度集成测试

mod common;

use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use common::{TestNode, sample_config};
use entity::{BackupSchedules, Domains, backup_schedules};
use pretty_assertions::assert_eq;
use proxy_fleet::backup::{BackupScheduler, BackupType, CreateSchedule};
use proxy_fleet::snapshot::EntityKind;
use sea_orm::{ActiveModelTrait, EntityTrait, IntoActiveModel, PaginatorTrait, Set};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_backup_file_restores_into_fresh_node() {
    let master = TestNode::new().await;
    master.seed(&sample_config()).await;
    assert_eq!(master.publisher.publish_all().await.unwrap(), 2);

    let record = master.backup.execute(None, BackupType::Manual).await.unwrap();
    assert_eq!(record.status, "success");
    assert_eq!(record.backup_type, "manual");
    assert!(record.size > 0);
    let metadata: serde_json::Value = serde_json::from_str(record.metadata.as_deref().unwrap()).unwrap();
    assert_eq!(metadata["domains"], 2);

    let bytes = std::fs::read(&record.filepath).unwrap();
    let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

    let restored = TestNode::new().await;
    let result = restored.backup.import(&value).await.unwrap();
    assert!(!result.report.has_failures(), "{:?}", result.report.failures());
    assert_eq!(result.report.summary(EntityKind::Domain).created, 2);
    assert_eq!(result.published, 2);
    assert!(result.reloaded);

    assert_eq!(restored.digest().await, master.digest().await);

    // vhost 按备份中的原文写回
    for name in ["api.example.com", "shop.example.com"] {
        let original = std::fs::read_to_string(master.paths.available_file(name)).unwrap();
        let copy = std::fs::read_to_string(restored.paths.available_file(name)).unwrap();
        assert_eq!(copy, original);
        assert!(restored.paths.enabled_link(name).exists());
    }
}

#[tokio::test]
async fn test_manual_run_then_reimport_matches_fresh_digest() {
    let node = TestNode::new().await;
    node.seed(&sample_config()).await;
    let schedule = node
        .backup
        .create_schedule(CreateSchedule {
            name: "weekly".to_string(),
            schedule: "@weekly".to_string(),
            enabled: true,
        })
        .await
        .unwrap();

    let record = node.backup.run_now(schedule.id).await.unwrap();
    assert_eq!(record.schedule_id, Some(schedule.id));
    assert!(std::path::Path::new(&record.filepath).exists());

    let value: serde_json::Value = serde_json::from_slice(&std::fs::read(&record.filepath).unwrap()).unwrap();
    let live_domains = Domains::find().count(node.db.as_ref()).await.unwrap();
    assert_eq!(value["domains"].as_array().unwrap().len() as u64, live_domains);

    let result = node.backup.import(&value).await.unwrap();
    assert!(!result.report.has_failures(), "{:?}", result.report.failures());
    let fresh = proxy_fleet::snapshot::digest(&node.builder.build_sync_snapshot().await.unwrap()).unwrap();
    assert_eq!(node.digest().await, fresh);

    let after = node.backup.get_schedule(schedule.id).await.unwrap();
    assert_eq!(after.status, "success");
}

#[tokio::test]
async fn test_restore_recorded_file_and_delete_it() {
    let node = TestNode::new().await;
    node.seed(&sample_config()).await;
    let record = node.backup.execute(None, BackupType::Manual).await.unwrap();

    // 备份时尚未发布，恢复时按数据库重新渲染
    let result = node.backup.restore_file(record.id).await.unwrap();
    assert!(!result.report.has_failures(), "{:?}", result.report.failures());
    assert_eq!(result.published, 2);
    assert!(node.paths.available_file("shop.example.com").exists());

    node.backup.delete_file(record.id).await.unwrap();
    assert!(!std::path::Path::new(&record.filepath).exists());
    assert!(node.backup.list_files().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_scheduler_runs_due_schedule_and_reschedules() {
    let node = TestNode::new().await;
    node.seed(&sample_config()).await;
    let schedule = node
        .backup
        .create_schedule(CreateSchedule {
            name: "nightly".to_string(),
            schedule: "0 3 * * *".to_string(),
            enabled: true,
        })
        .await
        .unwrap();
    assert_eq!(schedule.next_run, Some(Utc.with_ymd_and_hms(2024, 6, 1, 3, 0, 0).unwrap()));

    let scheduler = BackupScheduler::new(node.backup.clone(), Duration::from_secs(60));

    let early = scheduler.tick().await.unwrap();
    assert!(early.started.is_empty());

    node.clock.advance(ChronoDuration::hours(3));
    let due = scheduler.tick().await.unwrap();
    assert_eq!(due.started, vec![schedule.id]);
    due.join().await;

    let files = node.backup.list_files().await.unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].schedule_id, Some(schedule.id));
    assert_eq!(files[0].backup_type, "scheduled");

    let after = node.backup.get_schedule(schedule.id).await.unwrap();
    assert_eq!(after.status, "success");
    assert_eq!(after.last_run, Some(Utc.with_ymd_and_hms(2024, 6, 1, 3, 0, 0).unwrap()));
    assert_eq!(after.next_run, Some(Utc.with_ymd_and_hms(2024, 6, 2, 3, 0, 0).unwrap()));

    // 同一时刻再次 tick 不会重复执行
    let again = scheduler.tick().await.unwrap();
    assert!(again.started.is_empty());
}

#[tokio::test]
async fn test_recover_resets_schedule_left_running() {
    let node = TestNode::new().await;
    let schedule = node
        .backup
        .create_schedule(CreateSchedule {
            name: "hourly".to_string(),
            schedule: "@hourly".to_string(),
            enabled: true,
        })
        .await
        .unwrap();

    let mut active = schedule.into_active_model();
    active.status = Set("running".to_string());
    active.next_run = Set(Some(Utc.with_ymd_and_hms(2024, 5, 31, 22, 0, 0).unwrap()));
    let stuck: backup_schedules::Model = active.update(node.db.as_ref()).await.unwrap();

    node.clock.advance(ChronoDuration::minutes(30));
    let scheduler = Arc::new(BackupScheduler::new(node.backup.clone(), Duration::from_secs(60)));
    assert_eq!(scheduler.recover().await.unwrap(), 1);

    let recovered = BackupSchedules::find_by_id(stuck.id)
        .one(node.db.as_ref())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(recovered.status, "pending");
    assert_eq!(recovered.next_run, Some(Utc.with_ymd_and_hms(2024, 6, 1, 1, 0, 0).unwrap()));

    // 错过的运行不会补跑
    let report = scheduler.tick().await.unwrap();
    assert!(report.started.is_empty());
}
