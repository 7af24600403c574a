use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Upstreams::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Upstreams::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Upstreams::DomainId).integer().not_null())
                    .col(ColumnDef::new(Upstreams::Host).string_len(255).not_null())
                    .col(ColumnDef::new(Upstreams::Port).integer().not_null())
                    .col(
                        ColumnDef::new(Upstreams::Protocol)
                            .string_len(10)
                            .not_null()
                            .default("http"),
                    )
                    .col(
                        ColumnDef::new(Upstreams::Weight)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .col(
                        ColumnDef::new(Upstreams::MaxFails)
                            .integer()
                            .not_null()
                            .default(3),
                    )
                    .col(
                        ColumnDef::new(Upstreams::FailTimeout)
                            .integer()
                            .not_null()
                            .default(10),
                    )
                    .col(
                        ColumnDef::new(Upstreams::SslVerify)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Upstreams::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_upstreams_domain_id")
                            .from(Upstreams::Table, Upstreams::DomainId)
                            .to(Domains::Table, Domains::Id)
                            .on_update(ForeignKeyAction::Cascade)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_upstreams_domain_id")
                    .table(Upstreams::Table)
                    .col(Upstreams::DomainId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Upstreams::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Upstreams {
    Table,
    Id,
    DomainId,
    Host,
    Port,
    Protocol,
    Weight,
    MaxFails,
    FailTimeout,
    SslVerify,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Domains {
    Table,
    Id,
}
