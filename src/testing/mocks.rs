//! # Mock 对象
//!
//! 基于 wiremock 的主节点模拟服务，以及总是成功的 nginx 进程控制

use crate::nginx::process::{MockProcessControl, ProcessControl};
use crate::nodes::client::SLAVE_API_KEY_HEADER;
use serde_json::{Value, json};
use std::sync::Arc;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// 模拟主节点的管理接口
pub struct MockMasterServer {
    server: MockServer,
}

impl MockMasterServer {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    pub fn uri(&self) -> String {
        self.server.uri()
    }

    /// 携带正确密钥时返回导出数据
    pub async fn mock_export(&self, api_key: &str, data: Value) {
        Mock::given(method("GET"))
            .and(path("/api/node-sync/export"))
            .and(header(SLAVE_API_KEY_HEADER, api_key))
            .respond_with(ResponseTemplate::new(200).set_body_json(envelope(data)))
            .mount(&self.server)
            .await;
    }

    /// 携带正确密钥时心跳成功
    pub async fn mock_health(&self, api_key: &str) {
        Mock::given(method("GET"))
            .and(path("/api/node-sync/health"))
            .and(header(SLAVE_API_KEY_HEADER, api_key))
            .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!({
                "status": "ok",
                "node": "edge-1",
                "timestamp": "2024-01-01T00:00:00Z"
            }))))
            .mount(&self.server)
            .await;
    }

    /// 返回失败外壳
    pub async fn mock_failure(&self, route: &str, status: u16, message: &str) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(status).set_body_json(json!({
                "success": false,
                "data": null,
                "message": message,
                "timestamp": "2024-01-01T00:00:00Z"
            })))
            .mount(&self.server)
            .await;
    }

    /// 已收到的请求数
    pub async fn request_count(&self) -> usize {
        self.server
            .received_requests()
            .await
            .map_or(0, |requests| requests.len())
    }
}

fn envelope(data: Value) -> Value {
    json!({
        "success": true,
        "data": data,
        "message": null,
        "timestamp": "2024-01-01T00:00:00Z"
    })
}

/// 配置校验与重载都成功的进程控制
pub fn accepting_process_control() -> Arc<dyn ProcessControl> {
    let mut process = MockProcessControl::new();
    process.expect_test_config().returning(|| Ok(()));
    process.expect_reload().returning(|| Ok(()));
    process.expect_reload_alternate().returning(|| Ok(()));
    Arc::new(process)
}
