use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SlaveNodes::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SlaveNodes::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(SlaveNodes::Name)
                            .string_len(255)
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(SlaveNodes::Host).string_len(255).not_null())
                    .col(
                        ColumnDef::new(SlaveNodes::Port)
                            .integer()
                            .not_null()
                            .default(3001),
                    )
                    .col(
                        ColumnDef::new(SlaveNodes::ApiKey)
                            .string_len(128)
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(SlaveNodes::SyncEnabled)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(SlaveNodes::SyncInterval)
                            .integer()
                            .not_null()
                            .default(60),
                    )
                    .col(
                        ColumnDef::new(SlaveNodes::Status)
                            .string_len(20)
                            .not_null()
                            .default("offline"),
                    )
                    .col(ColumnDef::new(SlaveNodes::LastSeen).timestamp_with_time_zone())
                    .col(ColumnDef::new(SlaveNodes::ConfigHash).string_len(64))
                    .col(
                        ColumnDef::new(SlaveNodes::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(SlaveNodes::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_slave_nodes_status_last_seen")
                    .table(SlaveNodes::Table)
                    .col(SlaveNodes::Status)
                    .col(SlaveNodes::LastSeen)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SlaveNodes::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum SlaveNodes {
    Table,
    Id,
    Name,
    Host,
    Port,
    ApiKey,
    SyncEnabled,
    SyncInterval,
    Status,
    LastSeen,
    ConfigHash,
    CreatedAt,
    UpdatedAt,
}
