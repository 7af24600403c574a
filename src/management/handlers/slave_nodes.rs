//! # 从节点管理接口

use crate::error::Result;
use crate::management::middleware::AuthContext;
use crate::management::response::{ApiResponse, success, success_with_message, success_without_data};
use crate::management::server::AppState;
use crate::nodes::{RegisterNode, SyncSettings};
use axum::extract::{Path, State};
use axum::{Extension, Json};
use entity::slave_nodes;
use serde::Serialize;

/// 注册结果；密钥只在此处出现一次
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredNode {
    pub node: slave_nodes::Model,
    pub api_key: String,
}

pub async fn register_node(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<RegisterNode>,
) -> Result<ApiResponse<RegisteredNode>> {
    auth.require_admin()?;
    let (node, api_key) = state.registry.register(request).await?;
    Ok(success_with_message(
        RegisteredNode { node, api_key },
        "节点已注册，请妥善保存密钥，之后不会再次显示",
    ))
}

pub async fn list_nodes(State(state): State<AppState>) -> Result<ApiResponse<Vec<slave_nodes::Model>>> {
    Ok(success(state.registry.list().await?))
}

pub async fn get_node(State(state): State<AppState>, Path(id): Path<i32>) -> Result<ApiResponse<slave_nodes::Model>> {
    Ok(success(state.registry.get(id).await?))
}

pub async fn update_node(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i32>,
    Json(settings): Json<SyncSettings>,
) -> Result<ApiResponse<slave_nodes::Model>> {
    auth.require_admin()?;
    Ok(success(state.registry.update_sync_settings(id, settings).await?))
}

pub async fn delete_node(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i32>,
) -> Result<ApiResponse<()>> {
    auth.require_admin()?;
    state.registry.delete(id).await?;
    Ok(success_without_data("节点已删除"))
}
