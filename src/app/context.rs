//! # 应用上下文
//!
//! 统一持有跨模块共享的服务实例，便于在测试中注入替身实现

use crate::backup::{BackupScheduler, BackupService};
use crate::config::AppConfig;
use crate::error::Result;
use crate::nginx::{CertificateStore, ConfigFilePublisher, NginxPaths, NginxProcess, ProcessControl};
use crate::nodes::{MasterClient, NodeHealthMonitor, NodeRegistry, NodeSyncService, SlaveSyncTask};
use crate::snapshot::{ReconciliationImporter, SnapshotBuilder};
use crate::utils::{SharedClock, SystemClock};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<AppConfig>,
    pub db: Arc<DatabaseConnection>,
    pub clock: SharedClock,
    pub publisher: Arc<ConfigFilePublisher>,
    pub registry: Arc<NodeRegistry>,
    pub monitor: Arc<NodeHealthMonitor>,
    pub sync: Arc<NodeSyncService>,
    pub backup: Arc<BackupService>,
    pub backup_scheduler: Arc<BackupScheduler>,
    /// 仅从节点存在
    pub slave_sync: Option<Arc<SlaveSyncTask>>,
}

impl AppContext {
    /// 使用真实 nginx 进程与系统时钟
    pub fn from_config(config: Arc<AppConfig>, db: Arc<DatabaseConnection>) -> Result<Self> {
        let process: Arc<dyn ProcessControl> = Arc::new(NginxProcess::new(&config.nginx));
        Self::assemble(config, db, SystemClock::shared(), process)
    }

    pub fn assemble(
        config: Arc<AppConfig>,
        db: Arc<DatabaseConnection>,
        clock: SharedClock,
        process: Arc<dyn ProcessControl>,
    ) -> Result<Self> {
        let paths = NginxPaths::from_config(&config.nginx);

        let builder = Arc::new(SnapshotBuilder::new(db.clone(), paths.clone()));
        let importer = Arc::new(ReconciliationImporter::new(
            db.clone(),
            CertificateStore::new(paths.certs_dir.clone()),
        ));
        let publisher = Arc::new(ConfigFilePublisher::new(db.clone(), paths, process));
        let registry = Arc::new(NodeRegistry::new(db.clone(), clock.clone()));

        let monitor = Arc::new(NodeHealthMonitor::with_intervals(
            db.clone(),
            clock.clone(),
            Duration::from_secs(config.node.health_check_interval_secs),
            Duration::from_secs(config.node.offline_threshold_secs),
        ));

        let sync = Arc::new(NodeSyncService::new(
            builder.clone(),
            importer.clone(),
            publisher.clone(),
            registry.clone(),
            clock.clone(),
        ));

        let backup = Arc::new(BackupService::new(
            db.clone(),
            builder,
            importer,
            publisher.clone(),
            config.backup.directory.clone(),
            clock.clone(),
        ));
        let backup_scheduler = Arc::new(BackupScheduler::new(
            backup.clone(),
            Duration::from_secs(config.backup.tick_interval_secs),
        ));

        let slave_sync = if config.is_slave() {
            let client = MasterClient::from_config(&config.node)?;
            Some(Arc::new(SlaveSyncTask::new(
                client,
                sync.clone(),
                Duration::from_secs(config.node.sync_interval_secs),
            )))
        } else {
            None
        };

        Ok(Self {
            config,
            db,
            clock,
            publisher,
            registry,
            monitor,
            sync,
            backup,
            backup_scheduler,
            slave_sync,
        })
    }
}
