//! # 快照摘要与主从同步集成测试

mod common;

use common::{TestNode, reversed, sample_config};
use entity::{AclRules, Domains, ModsecRules, NlbUpstreams, Upstreams};
use pretty_assertions::assert_eq;
use proxy_fleet::nodes::{RegisterNode, SyncOutcome};
use proxy_fleet::snapshot::{EntityKind, digest};
use sea_orm::{EntityTrait, PaginatorTrait};

#[tokio::test]
async fn test_identical_content_hashes_identically_regardless_of_order() {
    let a = TestNode::new().await;
    let b = TestNode::new().await;

    a.seed(&sample_config()).await;
    b.seed(&reversed(&sample_config())).await;

    assert_eq!(a.digest().await, b.digest().await);
    assert_eq!(digest(&sample_config()).unwrap(), digest(&reversed(&sample_config())).unwrap());
}

#[tokio::test]
async fn test_content_change_changes_digest() {
    let a = TestNode::new().await;
    let b = TestNode::new().await;
    let mut changed = sample_config();
    changed.domains[0].upstreams[0].weight = 5;

    a.seed(&sample_config()).await;
    b.seed(&changed).await;

    assert_ne!(a.digest().await, b.digest().await);
}

#[tokio::test]
async fn test_export_and_apply_converges_slave() {
    let master = TestNode::new().await;
    master.seed(&sample_config()).await;
    let (_, key) = master
        .registry
        .register(RegisterNode {
            name: "edge-1".to_string(),
            host: "10.9.0.1".to_string(),
            port: 3001,
            sync_interval: None,
        })
        .await
        .unwrap();

    let export = master.sync.export(&key).await.unwrap();
    let payload = serde_json::to_value(&export.config).unwrap();

    let slave = TestNode::new().await;
    let outcome = slave.sync.apply(&export.hash, &payload).await.unwrap();
    let SyncOutcome::Imported { report, reloaded } = outcome else {
        panic!("expected an import");
    };
    assert!(reloaded);
    assert!(!report.has_failures(), "{:?}", report.failures());
    assert_eq!(report.summary(EntityKind::Domain).created, 2);
    assert_eq!(slave.digest().await, export.hash);

    // vhost 已发布，证书存在的域名带 HTTPS
    let shop = std::fs::read_to_string(slave.paths.available_file("shop.example.com")).unwrap();
    assert!(shop.contains("listen 443 ssl;"));
    assert!(shop.contains("return 301 https://$host$request_uri;"));
    let api = std::fs::read_to_string(slave.paths.available_file("api.example.com")).unwrap();
    assert!(!api.contains("listen 443"));
    assert!(api.contains("least_conn;"));
    assert_eq!(slave.process.reloads(), 1);

    // 再次推送相同摘要不产生任何写入
    let again = slave.sync.apply(&export.hash, &payload).await.unwrap();
    assert!(again.is_up_to_date());
    assert_eq!(slave.process.reloads(), 1);
}

#[tokio::test]
async fn test_reimport_keeps_natural_keys_and_duplicates_create_only_rows() {
    let node = TestNode::new().await;
    node.seed(&sample_config()).await;
    let report = node.importer.import_sync(&sample_config()).await;

    assert_eq!(report.summary(EntityKind::Domain).skipped, 2);
    assert_eq!(report.summary(EntityKind::User).skipped, 1);

    let db = node.db.as_ref();
    assert_eq!(Domains::find().count(db).await.unwrap(), 2);
    assert_eq!(Upstreams::find().count(db).await.unwrap(), 3);
    assert_eq!(NlbUpstreams::find().count(db).await.unwrap(), 2);
    // ACL 与自定义规则没有自然键，重复导入会追加
    assert_eq!(AclRules::find().count(db).await.unwrap(), 2);
    assert_eq!(ModsecRules::find().count(db).await.unwrap(), 2);
}

#[tokio::test]
async fn test_partial_failure_does_not_abort_import() {
    let node = TestNode::new().await;
    let mut payload = serde_json::to_value(sample_config()).unwrap();
    payload["modsecCustomRules"][0]["domainName"] = serde_json::json!("missing.example.com");
    payload["aclRules"].as_array_mut().unwrap().push(serde_json::json!({"name": "broken"}));

    let report = node.importer.import_value(&payload).await.unwrap();
    assert_eq!(report.summary(EntityKind::CustomRule).failed, 1);
    assert_eq!(report.summary(EntityKind::AclRule).failed, 1);
    assert_eq!(report.summary(EntityKind::AclRule).created, 1);
    assert_eq!(report.summary(EntityKind::NetworkLoadBalancer).created, 1);
    assert_eq!(report.failures().len(), 2);
}
