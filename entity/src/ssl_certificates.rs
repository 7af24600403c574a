//! # SSL 证书实体定义
//!
//! PEM 内容同时保存在数据库与证书目录中，数据库为准

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// SSL 证书实体
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "ssl_certificates")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub domain_id: i32,
    pub common_name: String,
    /// JSON 数组文本
    pub sans: String,
    pub issuer: String,
    #[sea_orm(column_type = "Text")]
    pub certificate: String,
    #[sea_orm(column_type = "Text")]
    pub private_key: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub chain: Option<String>,
    pub valid_from: DateTimeUtc,
    pub valid_to: DateTimeUtc,
    pub auto_renew: bool,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::domains::Entity",
        from = "Column::DomainId",
        to = "super::domains::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    Domain,
}

impl Related<super::domains::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Domain.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// 解析 SAN 列表，格式异常时视为空
    pub fn san_list(&self) -> Vec<String> {
        serde_json::from_str(&self.sans).unwrap_or_default()
    }
}
