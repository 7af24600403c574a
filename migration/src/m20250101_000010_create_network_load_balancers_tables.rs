use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(NetworkLoadBalancers::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(NetworkLoadBalancers::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(NetworkLoadBalancers::Name)
                            .string_len(255)
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(NetworkLoadBalancers::Description).text())
                    .col(ColumnDef::new(NetworkLoadBalancers::Port).integer().not_null())
                    .col(
                        ColumnDef::new(NetworkLoadBalancers::Protocol)
                            .string_len(10)
                            .not_null()
                            .default("tcp"),
                    )
                    .col(
                        ColumnDef::new(NetworkLoadBalancers::Algorithm)
                            .string_len(20)
                            .not_null()
                            .default("round_robin"),
                    )
                    .col(
                        ColumnDef::new(NetworkLoadBalancers::Status)
                            .string_len(20)
                            .not_null()
                            .default("active"),
                    )
                    .col(
                        ColumnDef::new(NetworkLoadBalancers::ProxyTimeout)
                            .integer()
                            .not_null()
                            .default(3),
                    )
                    .col(
                        ColumnDef::new(NetworkLoadBalancers::ProxyConnectTimeout)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .col(
                        ColumnDef::new(NetworkLoadBalancers::ProxyNextUpstream)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(NetworkLoadBalancers::ProxyNextUpstreamTimeout)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(NetworkLoadBalancers::ProxyNextUpstreamTries)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(NetworkLoadBalancers::HealthCheckEnabled)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(NetworkLoadBalancers::HealthCheckInterval)
                            .integer()
                            .not_null()
                            .default(10),
                    )
                    .col(
                        ColumnDef::new(NetworkLoadBalancers::HealthCheckTimeout)
                            .integer()
                            .not_null()
                            .default(5),
                    )
                    .col(
                        ColumnDef::new(NetworkLoadBalancers::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(NetworkLoadBalancers::UpdatedAt)
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
                    .table(NlbUpstreams::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(NlbUpstreams::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(NlbUpstreams::NlbId).integer().not_null())
                    .col(ColumnDef::new(NlbUpstreams::Host).string_len(255).not_null())
                    .col(ColumnDef::new(NlbUpstreams::Port).integer().not_null())
                    .col(
                        ColumnDef::new(NlbUpstreams::Weight)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .col(
                        ColumnDef::new(NlbUpstreams::MaxFails)
                            .integer()
                            .not_null()
                            .default(3),
                    )
                    .col(
                        ColumnDef::new(NlbUpstreams::FailTimeout)
                            .integer()
                            .not_null()
                            .default(10),
                    )
                    .col(
                        ColumnDef::new(NlbUpstreams::MaxConns)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(NlbUpstreams::Backup)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(NlbUpstreams::Down)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(NlbUpstreams::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_nlb_upstreams_nlb_id")
                            .from(NlbUpstreams::Table, NlbUpstreams::NlbId)
                            .to(NetworkLoadBalancers::Table, NetworkLoadBalancers::Id)
                            .on_update(ForeignKeyAction::Cascade)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(NlbUpstreams::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(NetworkLoadBalancers::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum NetworkLoadBalancers {
    Table,
    Id,
    Name,
    Description,
    Port,
    Protocol,
    Algorithm,
    Status,
    ProxyTimeout,
    ProxyConnectTimeout,
    ProxyNextUpstream,
    ProxyNextUpstreamTimeout,
    ProxyNextUpstreamTries,
    HealthCheckEnabled,
    HealthCheckInterval,
    HealthCheckTimeout,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum NlbUpstreams {
    Table,
    Id,
    NlbId,
    Host,
    Port,
    Weight,
    MaxFails,
    FailTimeout,
    MaxConns,
    Backup,
    Down,
    CreatedAt,
}
