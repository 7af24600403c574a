//! # 从节点实体定义
//!
//! 从节点通过 API 密钥拉取主节点配置，`status` 只由心跳新鲜度推导

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 从节点实体
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "slave_nodes")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub name: String,
    pub host: String,
    pub port: i32,
    #[sea_orm(unique)]
    #[serde(skip_serializing)]
    pub api_key: String,
    pub sync_enabled: bool,
    /// 同步间隔（秒）
    pub sync_interval: i32,
    /// online / offline
    pub status: String,
    pub last_seen: Option<DateTimeUtc>,
    pub config_hash: Option<String>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
