//! # 从节点注册表
//!
//! 节点身份、密钥与同步设置的管理。密钥只在注册时返回一次

use crate::error::{FleetError, Result};
use crate::utils::SharedClock;
use crate::{ensure_valid, linfo, logging::{LogComponent, LogStage}};
use entity::{SlaveNodes, slave_nodes};
use rand::RngCore;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter,
    QueryOrder, Set,
};
use serde::Deserialize;
use std::sync::Arc;

pub const STATUS_ONLINE: &str = "online";
pub const STATUS_OFFLINE: &str = "offline";

const DEFAULT_SYNC_INTERVAL: i32 = 60;

/// 注册请求
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterNode {
    pub name: String,
    pub host: String,
    pub port: i32,
    #[serde(default)]
    pub sync_interval: Option<i32>,
}

/// 同步设置更新
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSettings {
    pub sync_enabled: Option<bool>,
    pub sync_interval: Option<i32>,
}

/// 生成 256 位随机密钥（64 个十六进制字符）
#[must_use]
pub fn generate_api_key() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

pub struct NodeRegistry {
    db: Arc<DatabaseConnection>,
    clock: SharedClock,
}

impl NodeRegistry {
    pub fn new(db: Arc<DatabaseConnection>, clock: SharedClock) -> Self {
        Self { db, clock }
    }

    /// 注册节点，返回节点与明文密钥
    pub async fn register(&self, request: RegisterNode) -> Result<(slave_nodes::Model, String)> {
        ensure_valid!(!request.name.trim().is_empty(), "节点名称不能为空");
        ensure_valid!(!request.host.trim().is_empty(), "节点地址不能为空");
        ensure_valid!((1..=65535).contains(&request.port), "无效的端口: {}", request.port);
        let sync_interval = request.sync_interval.unwrap_or(DEFAULT_SYNC_INTERVAL);
        ensure_valid!(sync_interval > 0, "同步间隔必须大于0");

        let db = self.db.as_ref();
        let duplicate = SlaveNodes::find()
            .filter(slave_nodes::Column::Name.eq(&request.name))
            .one(db)
            .await?;
        if duplicate.is_some() {
            return Err(FleetError::conflict("slave_node", &request.name));
        }

        let api_key = generate_api_key();
        let now = self.clock.now();
        let node = slave_nodes::ActiveModel {
            name: Set(request.name),
            host: Set(request.host),
            port: Set(request.port),
            api_key: Set(api_key.clone()),
            sync_enabled: Set(true),
            sync_interval: Set(sync_interval),
            status: Set(STATUS_OFFLINE.to_string()),
            last_seen: Set(None),
            config_hash: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await?;

        linfo!(
            "system",
            LogStage::NodeSync,
            LogComponent::NodeRegistry,
            "register",
            "从节点已注册",
            node_id = node.id,
            name = %node.name
        );

        Ok((node, api_key))
    }

    /// 校验密钥并刷新心跳
    pub async fn authenticate(&self, api_key: &str) -> Result<slave_nodes::Model> {
        if api_key.is_empty() {
            return Err(FleetError::auth("缺少节点密钥"));
        }

        let db = self.db.as_ref();
        let node = SlaveNodes::find()
            .filter(slave_nodes::Column::ApiKey.eq(api_key))
            .one(db)
            .await?
            .ok_or_else(|| FleetError::auth("无效的节点密钥"))?;

        if !node.sync_enabled {
            return Err(FleetError::permission(format!("节点 {} 已禁用同步", node.name)));
        }

        let now = self.clock.now();
        let mut active = node.into_active_model();
        active.last_seen = Set(Some(now));
        active.status = Set(STATUS_ONLINE.to_string());
        active.updated_at = Set(now);
        Ok(active.update(db).await?)
    }

    pub async fn list(&self) -> Result<Vec<slave_nodes::Model>> {
        Ok(SlaveNodes::find()
            .order_by_asc(slave_nodes::Column::Name)
            .all(self.db.as_ref())
            .await?)
    }

    pub async fn get(&self, id: i32) -> Result<slave_nodes::Model> {
        SlaveNodes::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| FleetError::not_found("slave_node", id))
    }

    pub async fn delete(&self, id: i32) -> Result<()> {
        let result = SlaveNodes::delete_by_id(id).exec(self.db.as_ref()).await?;
        if result.rows_affected == 0 {
            return Err(FleetError::not_found("slave_node", id));
        }

        linfo!(
            "system",
            LogStage::NodeSync,
            LogComponent::NodeRegistry,
            "delete",
            "从节点已删除",
            node_id = id
        );
        Ok(())
    }

    pub async fn update_sync_settings(&self, id: i32, settings: SyncSettings) -> Result<slave_nodes::Model> {
        if let Some(interval) = settings.sync_interval {
            ensure_valid!(interval > 0, "同步间隔必须大于0");
        }

        let node = self.get(id).await?;
        let mut active = node.into_active_model();
        if let Some(enabled) = settings.sync_enabled {
            active.sync_enabled = Set(enabled);
        }
        if let Some(interval) = settings.sync_interval {
            active.sync_interval = Set(interval);
        }
        active.updated_at = Set(self.clock.now());
        Ok(active.update(self.db.as_ref()).await?)
    }

    /// 记录节点最近一次拉取到的配置摘要
    pub async fn record_config_hash(&self, id: i32, hash: &str) -> Result<()> {
        let node = self.get(id).await?;
        let mut active = node.into_active_model();
        active.config_hash = Set(Some(hash.to_string()));
        active.updated_at = Set(self.clock.now());
        active.update(self.db.as_ref()).await?;
        Ok(())
    }
}
