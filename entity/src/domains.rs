//! # 域名实体定义
//!
//! 一个域名对应 nginx 中的一个虚拟主机（vhost）

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 域名实体
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "domains")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub name: String,
    /// active / inactive / error
    pub status: String,
    pub ssl_enabled: bool,
    pub modsec_enabled: bool,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::upstreams::Entity")]
    Upstreams,
    #[sea_orm(has_one = "super::load_balancer_configs::Entity")]
    LoadBalancerConfig,
    #[sea_orm(has_one = "super::ssl_certificates::Entity")]
    SslCertificate,
}

impl Related<super::upstreams::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Upstreams.def()
    }
}

impl Related<super::load_balancer_configs::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::LoadBalancerConfig.def()
    }
}

impl Related<super::ssl_certificates::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SslCertificate.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// 域名是否处于启用状态
    pub fn is_active(&self) -> bool {
        self.status == "active"
    }
}
