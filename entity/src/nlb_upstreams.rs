//! # 四层负载均衡上游实体

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "nlb_upstreams")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub nlb_id: i32,
    pub host: String,
    pub port: i32,
    pub weight: i32,
    pub max_fails: i32,
    pub fail_timeout: i32,
    pub max_conns: i32,
    pub backup: bool,
    pub down: bool,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::network_load_balancers::Entity",
        from = "Column::NlbId",
        to = "super::network_load_balancers::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    NetworkLoadBalancer,
}

impl Related<super::network_load_balancers::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::NetworkLoadBalancer.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
