//! # 备份文件记录实体

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "backup_files")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub schedule_id: Option<i32>,
    pub filename: String,
    pub filepath: String,
    pub size: i64,
    /// success / failed
    pub status: String,
    /// manual / scheduled
    pub backup_type: String,
    /// 各类实体数量等元数据，JSON 文本
    #[sea_orm(column_type = "Text", nullable)]
    pub metadata: Option<String>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::backup_schedules::Entity",
        from = "Column::ScheduleId",
        to = "super::backup_schedules::Column::Id",
        on_update = "Cascade",
        on_delete = "SetNull"
    )]
    Schedule,
}

impl Related<super::backup_schedules::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Schedule.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
