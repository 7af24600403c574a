use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(NginxConfigs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(NginxConfigs::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(NginxConfigs::Name)
                            .string_len(255)
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(NginxConfigs::ConfigType)
                            .string_len(20)
                            .not_null()
                            .default("http"),
                    )
                    .col(ColumnDef::new(NginxConfigs::Value).text().not_null())
                    .col(
                        ColumnDef::new(NginxConfigs::Enabled)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(NginxConfigs::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(NginxConfigs::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(NginxConfigs::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum NginxConfigs {
    Table,
    Id,
    Name,
    ConfigType,
    Value,
    Enabled,
    CreatedAt,
    UpdatedAt,
}
