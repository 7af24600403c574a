use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(BackupSchedules::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(BackupSchedules::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(BackupSchedules::Name).string_len(255).not_null())
                    .col(
                        ColumnDef::new(BackupSchedules::Schedule)
                            .string_len(100)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(BackupSchedules::Enabled)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(BackupSchedules::Status)
                            .string_len(20)
                            .not_null()
                            .default("pending"),
                    )
                    .col(ColumnDef::new(BackupSchedules::LastRun).timestamp_with_time_zone())
                    .col(ColumnDef::new(BackupSchedules::NextRun).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(BackupSchedules::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(BackupSchedules::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(BackupFiles::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(BackupFiles::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(BackupFiles::ScheduleId).integer())
                    .col(ColumnDef::new(BackupFiles::Filename).string_len(255).not_null())
                    .col(ColumnDef::new(BackupFiles::Filepath).string_len(1024).not_null())
                    .col(
                        ColumnDef::new(BackupFiles::Size)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(BackupFiles::Status)
                            .string_len(20)
                            .not_null()
                            .default("success"),
                    )
                    .col(
                        ColumnDef::new(BackupFiles::BackupType)
                            .string_len(20)
                            .not_null()
                            .default("manual"),
                    )
                    .col(ColumnDef::new(BackupFiles::Metadata).text())
                    .col(
                        ColumnDef::new(BackupFiles::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_backup_files_schedule_id")
                            .from(BackupFiles::Table, BackupFiles::ScheduleId)
                            .to(BackupSchedules::Table, BackupSchedules::Id)
                            .on_update(ForeignKeyAction::Cascade)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_backup_files_created_at")
                    .table(BackupFiles::Table)
                    .col(BackupFiles::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(BackupFiles::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(BackupSchedules::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum BackupSchedules {
    Table,
    Id,
    Name,
    Schedule,
    Enabled,
    Status,
    LastRun,
    NextRun,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum BackupFiles {
    Table,
    Id,
    ScheduleId,
    Filename,
    Filepath,
    Size,
    Status,
    BackupType,
    Metadata,
    CreatedAt,
}
