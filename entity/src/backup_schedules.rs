//! # 备份计划实体定义

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 备份计划
///
/// `status` 取值 pending / running / success / failed，`running` 表示有一次执行尚未结束
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "backup_schedules")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    /// 五段式 cron 表达式
    pub schedule: String,
    pub enabled: bool,
    pub status: String,
    pub last_run: Option<DateTimeUtc>,
    pub next_run: Option<DateTimeUtc>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::backup_files::Entity")]
    Files,
}

impl Related<super::backup_files::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Files.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
