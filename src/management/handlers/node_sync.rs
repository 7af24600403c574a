//! # 主从同步接口

use crate::error::Result;
use crate::management::middleware::{AuthContext, slave_api_key};
use crate::management::response::{ApiResponse, success, success_with_message};
use crate::management::server::AppState;
use crate::nodes::{SyncExport, SyncImportRequest, SyncOutcome};
use crate::snapshot::ChangeReport;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResponse {
    pub up_to_date: bool,
    pub changes: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<ChangeReport>,
    pub reloaded: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeHealth {
    pub status: &'static str,
    pub node: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct DigestResponse {
    pub hash: String,
}

/// 从节点拉取配置
pub async fn export_config(State(state): State<AppState>, headers: HeaderMap) -> Result<ApiResponse<SyncExport>> {
    let api_key = slave_api_key(&headers)?;
    Ok(success(state.sync.export(api_key).await?))
}

/// 从节点心跳
pub async fn node_health(State(state): State<AppState>, headers: HeaderMap) -> Result<ApiResponse<NodeHealth>> {
    let api_key = slave_api_key(&headers)?;
    let node = state.registry.authenticate(api_key).await?;
    Ok(success(NodeHealth {
        status: "ok",
        node: node.name,
        timestamp: state.clock.now(),
    }))
}

/// 推送导入
pub async fn import_config(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<SyncImportRequest>,
) -> Result<ApiResponse<ImportResponse>> {
    auth.require_admin()?;

    let response = match state.sync.apply(&request.hash, &request.config).await? {
        SyncOutcome::UpToDate => {
            return Ok(success_with_message(
                ImportResponse {
                    up_to_date: true,
                    changes: 0,
                    report: None,
                    reloaded: false,
                },
                "配置已是最新",
            ));
        }
        SyncOutcome::Imported { report, reloaded } => ImportResponse {
            up_to_date: false,
            changes: report.total_changes(),
            report: Some(report),
            reloaded,
        },
    };

    let message = if response.reloaded {
        "配置已导入"
    } else {
        "配置已导入，但 nginx 未能重载，需要手动重载"
    };
    Ok(success_with_message(response, message))
}

/// 当前配置摘要
pub async fn current_digest(State(state): State<AppState>) -> Result<ApiResponse<DigestResponse>> {
    Ok(success(DigestResponse {
        hash: state.sync.current_digest().await?,
    }))
}
