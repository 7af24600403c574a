//! # 配置同步服务
//!
//! 主节点侧导出带摘要的同步快照；从节点侧比较摘要后决定是否导入

use super::registry::NodeRegistry;
use crate::error::Result;
use crate::nginx::ConfigFilePublisher;
use crate::snapshot::{ChangeReport, ReconciliationImporter, SnapshotBuilder, SyncConfig, digest};
use crate::utils::SharedClock;
use crate::{lerror, linfo, lwarn, logging::{LogComponent, LogStage}};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// 导出给从节点的载荷
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncExport {
    pub hash: String,
    pub timestamp: DateTime<Utc>,
    pub config: SyncConfig,
}

/// 导入请求体；`config` 保持未类型化，以便逐个元素容错解码
#[derive(Debug, Clone, Deserialize)]
pub struct SyncImportRequest {
    pub hash: String,
    pub config: Value,
}

/// 导入结果
#[derive(Debug, Clone)]
pub enum SyncOutcome {
    /// 本地摘要与对端一致，没有任何写入
    UpToDate,
    Imported {
        report: ChangeReport,
        /// 导入后 nginx 是否重载成功
        reloaded: bool,
    },
}

impl SyncOutcome {
    #[must_use]
    pub const fn is_up_to_date(&self) -> bool {
        matches!(self, Self::UpToDate)
    }
}

pub struct NodeSyncService {
    builder: Arc<SnapshotBuilder>,
    importer: Arc<ReconciliationImporter>,
    publisher: Arc<ConfigFilePublisher>,
    registry: Arc<NodeRegistry>,
    clock: SharedClock,
}

impl NodeSyncService {
    pub fn new(
        builder: Arc<SnapshotBuilder>,
        importer: Arc<ReconciliationImporter>,
        publisher: Arc<ConfigFilePublisher>,
        registry: Arc<NodeRegistry>,
        clock: SharedClock,
    ) -> Self {
        Self {
            builder,
            importer,
            publisher,
            registry,
            clock,
        }
    }

    /// 当前库内容的摘要
    pub async fn current_digest(&self) -> Result<String> {
        let config = self.builder.build_sync_snapshot().await?;
        digest(&config)
    }

    /// 校验从节点密钥并导出快照，同时记录该节点拿到的摘要
    pub async fn export(&self, api_key: &str) -> Result<SyncExport> {
        let node = self.registry.authenticate(api_key).await?;
        let config = self.builder.build_sync_snapshot().await?;
        let hash = digest(&config)?;
        self.registry.record_config_hash(node.id, &hash).await?;

        linfo!(
            "system",
            LogStage::NodeSync,
            LogComponent::NodeRegistry,
            "export",
            "从节点拉取配置",
            node = %node.name,
            hash = %hash
        );

        Ok(SyncExport {
            hash,
            timestamp: self.clock.now(),
            config,
        })
    }

    /// 摘要不同则导入并重新发布 vhost
    ///
    /// 导入一旦完成即返回报告；发布失败时不重载，`reloaded` 为 false
    pub async fn apply(&self, remote_hash: &str, config: &Value) -> Result<SyncOutcome> {
        let local_hash = self.current_digest().await?;
        if local_hash == remote_hash {
            linfo!(
                "system",
                LogStage::NodeSync,
                LogComponent::Importer,
                "apply",
                "配置已是最新，跳过导入",
                hash = %local_hash
            );
            return Ok(SyncOutcome::UpToDate);
        }

        let report = self.importer.import_value(config).await?;
        let reloaded = match self.publisher.publish_all().await {
            Ok(_) => self.publisher.reload().await,
            Err(e) => {
                lerror!(
                    "system",
                    LogStage::NodeSync,
                    LogComponent::Publisher,
                    "apply",
                    "配置已导入但 vhost 发布失败",
                    error = %e
                );
                false
            }
        };
        if !reloaded {
            lwarn!(
                "system",
                LogStage::NodeSync,
                LogComponent::Publisher,
                "apply",
                "配置已导入但 nginx 未能重载，需要手动重载"
            );
        }

        linfo!(
            "system",
            LogStage::NodeSync,
            LogComponent::Importer,
            "apply",
            "同步配置已导入",
            changes = report.total_changes(),
            failures = report.failures().len()
        );

        Ok(SyncOutcome::Imported { report, reloaded })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FleetError;
    use crate::nginx::process::MockProcessControl;
    use crate::nginx::{CertificateStore, NginxPaths};
    use crate::nodes::registry::{RegisterNode, STATUS_ONLINE};
    use crate::testing::{self, fixtures};
    use crate::utils::SystemClock;
    use sea_orm::DatabaseConnection;
    use tempfile::TempDir;

    struct Harness {
        db: Arc<DatabaseConnection>,
        service: NodeSyncService,
        registry: Arc<NodeRegistry>,
        _dir: TempDir,
    }

    async fn harness() -> Harness {
        let db = Arc::new(testing::create_test_db().await);
        harness_with_publisher_db(db.clone(), db).await
    }

    async fn harness_with_publisher_db(
        db: Arc<DatabaseConnection>,
        publisher_db: Arc<DatabaseConnection>,
    ) -> Harness {
        let (paths, dir) = testing::create_nginx_layout();
        let clock = SystemClock::shared();

        let mut process = MockProcessControl::new();
        process.expect_test_config().returning(|| Ok(()));
        process.expect_reload().returning(|| Ok(()));

        let registry = Arc::new(NodeRegistry::new(db.clone(), clock.clone()));
        let service = NodeSyncService::new(
            Arc::new(SnapshotBuilder::new(db.clone(), paths.clone())),
            Arc::new(ReconciliationImporter::new(
                db.clone(),
                CertificateStore::new(paths.certs_dir.clone()),
            )),
            Arc::new(ConfigFilePublisher::new(publisher_db, NginxPaths::clone(&paths), Arc::new(process))),
            registry.clone(),
            clock,
        );

        Harness {
            db,
            service,
            registry,
            _dir: dir,
        }
    }

    #[tokio::test]
    async fn test_export_records_hash_and_liveness() {
        let h = harness().await;
        fixtures::insert_domain(&h.db, "example.com", false).await;
        let (node, key) = h
            .registry
            .register(RegisterNode {
                name: "edge-1".to_string(),
                host: "10.0.0.9".to_string(),
                port: 3001,
                sync_interval: None,
            })
            .await
            .unwrap();

        let export = h.service.export(&key).await.unwrap();
        assert_eq!(export.hash, h.service.current_digest().await.unwrap());
        assert_eq!(export.config.domains.len(), 1);

        let node = h.registry.get(node.id).await.unwrap();
        assert_eq!(node.config_hash.as_deref(), Some(export.hash.as_str()));
        assert_eq!(node.status, STATUS_ONLINE);
    }

    #[tokio::test]
    async fn test_export_rejects_unknown_key() {
        let h = harness().await;
        let err = h.service.export("nope").await.unwrap_err();
        assert!(matches!(err, FleetError::Auth { .. }));
    }

    #[tokio::test]
    async fn test_apply_matching_hash_is_noop() {
        let h = harness().await;
        fixtures::insert_domain(&h.db, "example.com", false).await;
        let local = h.service.current_digest().await.unwrap();

        // 载荷即使无效也不会被读取
        let outcome = h.service.apply(&local, &Value::Null).await.unwrap();
        assert!(outcome.is_up_to_date());
    }

    #[tokio::test]
    async fn test_apply_imports_and_publishes() {
        let source = harness().await;
        fixtures::insert_domain(&source.db, "example.com", false).await;
        let config = source.service.builder.build_sync_snapshot().await.unwrap();
        let hash = digest(&config).unwrap();

        let target = harness().await;
        let value = serde_json::to_value(&config).unwrap();
        let outcome = target.service.apply(&hash, &value).await.unwrap();

        match outcome {
            SyncOutcome::Imported { report, reloaded } => {
                assert!(report.total_changes() >= 1);
                assert!(reloaded);
            }
            SyncOutcome::UpToDate => panic!("expected import"),
        }
        assert_eq!(target.service.current_digest().await.unwrap(), hash);
        assert!(target.service.publisher.paths().available_file("example.com").exists());
    }

    #[tokio::test]
    async fn test_apply_keeps_import_when_publish_fails() {
        let source = harness().await;
        fixtures::insert_domain(&source.db, "example.com", false).await;
        let config = source.service.builder.build_sync_snapshot().await.unwrap();
        let hash = digest(&config).unwrap();

        // 发布器连接的库没有建表，publish_all 必然失败
        let db = Arc::new(testing::create_test_db().await);
        let empty = Arc::new(sea_orm::Database::connect("sqlite::memory:").await.unwrap());
        let target = harness_with_publisher_db(db, empty).await;
        let value = serde_json::to_value(&config).unwrap();
        let outcome = target.service.apply(&hash, &value).await.unwrap();

        match outcome {
            SyncOutcome::Imported { report, reloaded } => {
                assert_eq!(report.summary(crate::snapshot::EntityKind::Domain).created, 1);
                assert!(!reloaded);
            }
            SyncOutcome::UpToDate => panic!("expected import"),
        }
        assert_eq!(target.service.current_digest().await.unwrap(), hash);
        assert!(!target.service.publisher.paths().available_file("example.com").exists());
    }
}
