//! # 从节点同步客户端
//!
//! 从节点周期性地向主节点拉取配置。主节点摘要与上次同步的摘要相同时直接跳过，
//! 否则交给本地 [`NodeSyncService`] 比较并导入

use super::sync::{NodeSyncService, SyncOutcome};
use crate::config::NodeConfig;
use crate::error::{Context, FleetError, Result};
use crate::{ldebug, lerror, linfo, logging::{LogComponent, LogStage}};
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;

/// 从节点认证请求头
pub const SLAVE_API_KEY_HEADER: &str = "X-Slave-API-Key";

const EXPORT_PATH: &str = "/api/node-sync/export";
const HEALTH_PATH: &str = "/api/node-sync/health";

/// 管理接口的统一响应外壳
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    data: Option<T>,
    #[serde(default)]
    message: Option<String>,
}

/// 主节点导出的配置，`config` 保持原样交给导入器
#[derive(Debug, Clone, Deserialize)]
pub struct MasterExport {
    pub hash: String,
    pub timestamp: String,
    pub config: Value,
}

#[derive(Clone)]
pub struct MasterClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl MasterClient {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FleetError::network_with_source("创建 HTTP 客户端失败", e))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    pub fn from_config(config: &NodeConfig) -> Result<Self> {
        let base_url = config
            .master_url
            .as_deref()
            .ok_or_else(|| FleetError::config("从节点缺少 master_url"))?;
        let api_key = config
            .api_key
            .as_deref()
            .ok_or_else(|| FleetError::config("从节点缺少 api_key"))?;
        Self::new(base_url, api_key, Duration::from_secs(config.request_timeout_secs))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{path}", self.base_url);
        let response = self
            .http
            .get(&url)
            .header(SLAVE_API_KEY_HEADER, &self.api_key)
            .send()
            .await
            .with_context(|| format!("请求主节点失败: {url}"))?;

        let status = response.status();
        let envelope: Envelope<T> = response
            .json()
            .await
            .with_context(|| format!("主节点响应无法解析: {url}"))?;

        if !status.is_success() || !envelope.success {
            return Err(FleetError::network(format!(
                "主节点返回错误 {status}: {}",
                envelope.message.unwrap_or_default()
            )));
        }

        envelope
            .data
            .ok_or_else(|| FleetError::network(format!("主节点响应缺少 data: {url}")))
    }

    /// 拉取主节点配置
    pub async fn fetch_config(&self) -> Result<MasterExport> {
        self.get(EXPORT_PATH).await
    }

    /// 心跳；主节点借此刷新本节点的 `last_seen`
    pub async fn check_health(&self) -> Result<()> {
        self.get::<Value>(HEALTH_PATH).await.map(|_| ())
    }
}

/// 单次拉取的结果
#[derive(Debug)]
pub enum PullResult {
    /// 主节点摘要未变化，未发起导入
    Unchanged,
    Synced(SyncOutcome),
}

pub struct SlaveSyncTask {
    client: MasterClient,
    service: Arc<NodeSyncService>,
    interval: Duration,
    last_sync_hash: RwLock<Option<String>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SlaveSyncTask {
    pub fn new(client: MasterClient, service: Arc<NodeSyncService>, interval: Duration) -> Self {
        Self {
            client,
            service,
            interval,
            last_sync_hash: RwLock::new(None),
            task: Mutex::new(None),
        }
    }

    pub async fn last_sync_hash(&self) -> Option<String> {
        self.last_sync_hash.read().await.clone()
    }

    /// 拉取一次并按需导入；主节点心跳不通时不发起拉取
    pub async fn pull_once(&self) -> Result<PullResult> {
        self.client.check_health().await?;
        let export = self.client.fetch_config().await?;

        if self.last_sync_hash.read().await.as_deref() == Some(export.hash.as_str()) {
            ldebug!(
                "system",
                LogStage::NodeSync,
                LogComponent::SyncClient,
                "pull",
                "主节点配置未变化",
                hash = %export.hash
            );
            return Ok(PullResult::Unchanged);
        }

        let outcome = self.service.apply(&export.hash, &export.config).await?;
        let clean = match &outcome {
            SyncOutcome::UpToDate => true,
            SyncOutcome::Imported { report, .. } => !report.has_failures(),
        };
        // 有失败项时不记录摘要，下一轮重试
        if clean {
            *self.last_sync_hash.write().await = Some(export.hash.clone());
        }

        linfo!(
            "system",
            LogStage::NodeSync,
            LogComponent::SyncClient,
            "pull",
            "从主节点同步完成",
            hash = %export.hash,
            up_to_date = outcome.is_up_to_date()
        );
        Ok(PullResult::Synced(outcome))
    }

    pub async fn start(self: &Arc<Self>) {
        let mut guard = self.task.lock().await;
        if guard.is_some() {
            return;
        }

        let task = Arc::clone(self);
        *guard = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(task.interval);
            loop {
                ticker.tick().await;
                if let Err(e) = task.pull_once().await {
                    lerror!(
                        "system",
                        LogStage::NodeSync,
                        LogComponent::SyncClient,
                        "pull",
                        "从主节点同步失败",
                        error = %e
                    );
                }
            }
        }));

        linfo!(
            "system",
            LogStage::Startup,
            LogComponent::SyncClient,
            "start",
            "从节点同步任务已启动",
            interval_secs = self.interval.as_secs()
        );
    }

    pub async fn stop(&self) {
        if let Some(task) = self.task.lock().await.take() {
            task.abort();
            linfo!("system", LogStage::Shutdown, LogComponent::SyncClient, "stop", "从节点同步任务已停止");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockMasterServer;
    use serde_json::json;

    #[tokio::test]
    async fn test_fetch_config_sends_key_header() {
        let master = MockMasterServer::start().await;
        master
            .mock_export("secret", json!({"hash": "abc", "timestamp": "2024-01-01T00:00:00Z", "config": {}}))
            .await;

        let client = MasterClient::new(&master.uri(), "secret", Duration::from_secs(5)).unwrap();
        let export = client.fetch_config().await.unwrap();
        assert_eq!(export.hash, "abc");

        let wrong = MasterClient::new(&master.uri(), "other", Duration::from_secs(5)).unwrap();
        assert!(wrong.fetch_config().await.is_err());
    }

    #[tokio::test]
    async fn test_health_probe_uses_key() {
        let master = MockMasterServer::start().await;
        master.mock_health("secret").await;

        let client = MasterClient::new(&master.uri(), "secret", Duration::from_secs(5)).unwrap();
        client.check_health().await.unwrap();
        assert_eq!(master.request_count().await, 1);
    }

    #[tokio::test]
    async fn test_error_envelope_is_network_error() {
        let master = MockMasterServer::start().await;
        master.mock_failure(HEALTH_PATH, 401, "无效的节点密钥").await;

        let client = MasterClient::new(&master.uri(), "secret", Duration::from_secs(5)).unwrap();
        let err = client.check_health().await.unwrap_err();
        assert!(err.to_string().contains("无效的节点密钥"));
    }

    #[test]
    fn test_from_config_requires_master() {
        let config = NodeConfig::default();
        assert!(matches!(
            MasterClient::from_config(&config),
            Err(FleetError::Config { .. })
        ));
    }
}
