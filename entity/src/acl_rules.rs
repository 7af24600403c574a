//! # 访问控制规则实体

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "acl_rules")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    /// whitelist / blacklist
    pub rule_type: String,
    /// ip / geoip / user_agent / url / method / header
    pub condition_field: String,
    /// equals / contains / regex
    pub condition_operator: String,
    pub condition_value: String,
    /// allow / deny / challenge
    pub action: String,
    pub enabled: bool,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
