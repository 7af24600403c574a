//! # 从节点拉取集成测试
//!
//! 主节点运行真实的管理接口，从节点通过 HTTP 拉取并导入

mod common;

use common::{TestNode, app_context, master_config, sample_config};
use pretty_assertions::assert_eq;
use proxy_fleet::app::AppContext;
use proxy_fleet::error::FleetError;
use proxy_fleet::management::{AppState, build_router};
use proxy_fleet::nodes::{MasterClient, PullResult, RegisterNode, SlaveSyncTask, SyncOutcome};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct RunningMaster {
    context: Arc<AppContext>,
    base_url: String,
    _dir: TempDir,
}

async fn start_master() -> RunningMaster {
    let dir = tempfile::tempdir().unwrap();
    let context = app_context(master_config(dir.path())).await;
    let seed = serde_json::to_value(sample_config()).unwrap();
    context.sync.apply("seed", &seed).await.unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = build_router(AppState::new(context.clone()));
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    RunningMaster {
        context,
        base_url: format!("http://{addr}"),
        _dir: dir,
    }
}

async fn register(master: &RunningMaster) -> String {
    let (_, key) = master
        .context
        .registry
        .register(RegisterNode {
            name: "edge-1".to_string(),
            host: "127.0.0.1".to_string(),
            port: 3002,
            sync_interval: Some(30),
        })
        .await
        .unwrap();
    key
}

#[tokio::test]
async fn test_slave_pulls_master_config_once() {
    let master = start_master().await;
    let key = register(&master).await;
    let slave = TestNode::new().await;

    let client = MasterClient::new(&master.base_url, &key, Duration::from_secs(5)).unwrap();
    client.check_health().await.unwrap();
    let task = SlaveSyncTask::new(client, slave.sync.clone(), Duration::from_secs(60));

    let first = task.pull_once().await.unwrap();
    let PullResult::Synced(SyncOutcome::Imported { report, reloaded }) = first else {
        panic!("expected an import, got {first:?}");
    };
    assert!(reloaded);
    assert!(!report.has_failures(), "{:?}", report.failures());

    let master_hash = master.context.sync.current_digest().await.unwrap();
    assert_eq!(slave.digest().await, master_hash);
    assert_eq!(task.last_sync_hash().await, Some(master_hash.clone()));
    assert!(slave.paths.enabled_link("api.example.com").exists());

    let second = task.pull_once().await.unwrap();
    assert!(matches!(second, PullResult::Unchanged));
    assert_eq!(slave.process.reloads(), 1);

    let node = master.context.registry.list().await.unwrap().remove(0);
    assert_eq!(node.status, "online");
    assert_eq!(node.config_hash, Some(master_hash));
}

#[tokio::test]
async fn test_wrong_key_is_rejected_by_master() {
    let master = start_master().await;
    register(&master).await;
    let slave = TestNode::new().await;

    let client = MasterClient::new(&master.base_url, "not-a-key", Duration::from_secs(5)).unwrap();
    let task = SlaveSyncTask::new(client, slave.sync.clone(), Duration::from_secs(60));

    let err = task.pull_once().await.unwrap_err();
    assert!(matches!(err, FleetError::Network { .. }), "{err:?}");
    assert_eq!(task.last_sync_hash().await, None);
}

#[tokio::test]
async fn test_master_failure_leaves_slave_untouched() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/node-sync/export"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let slave = TestNode::new().await;
    slave.seed(&sample_config()).await;
    let before = slave.digest().await;

    let client = MasterClient::new(&server.uri(), "key", Duration::from_secs(5)).unwrap();
    let task = SlaveSyncTask::new(client, slave.sync.clone(), Duration::from_secs(60));

    assert!(task.pull_once().await.is_err());
    assert_eq!(slave.digest().await, before);
    assert_eq!(slave.process.reloads(), 0);
}
