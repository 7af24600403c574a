//! # 四层负载均衡（stream 模块）实体

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "network_load_balancers")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub name: String,
    pub description: Option<String>,
    pub port: i32,
    /// tcp / udp / tcp_udp
    pub protocol: String,
    pub algorithm: String,
    pub status: String,
    pub proxy_timeout: i32,
    pub proxy_connect_timeout: i32,
    pub proxy_next_upstream: bool,
    pub proxy_next_upstream_timeout: i32,
    pub proxy_next_upstream_tries: i32,
    pub health_check_enabled: bool,
    pub health_check_interval: i32,
    pub health_check_timeout: i32,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::nlb_upstreams::Entity")]
    Upstreams,
}

impl Related<super::nlb_upstreams::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Upstreams.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
