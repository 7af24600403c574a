use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(LoadBalancerConfigs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(LoadBalancerConfigs::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(LoadBalancerConfigs::DomainId)
                            .integer()
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(LoadBalancerConfigs::Algorithm)
                            .string_len(20)
                            .not_null()
                            .default("round_robin"),
                    )
                    .col(
                        ColumnDef::new(LoadBalancerConfigs::HealthCheckEnabled)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(LoadBalancerConfigs::HealthCheckInterval)
                            .integer()
                            .not_null()
                            .default(30),
                    )
                    .col(
                        ColumnDef::new(LoadBalancerConfigs::HealthCheckTimeout)
                            .integer()
                            .not_null()
                            .default(5),
                    )
                    .col(
                        ColumnDef::new(LoadBalancerConfigs::HealthCheckPath)
                            .string_len(255)
                            .not_null()
                            .default("/health"),
                    )
                    .col(
                        ColumnDef::new(LoadBalancerConfigs::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(LoadBalancerConfigs::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_load_balancer_configs_domain_id")
                            .from(LoadBalancerConfigs::Table, LoadBalancerConfigs::DomainId)
                            .to(Domains::Table, Domains::Id)
                            .on_update(ForeignKeyAction::Cascade)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(LoadBalancerConfigs::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum LoadBalancerConfigs {
    Table,
    Id,
    DomainId,
    Algorithm,
    HealthCheckEnabled,
    HealthCheckInterval,
    HealthCheckTimeout,
    HealthCheckPath,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Domains {
    Table,
    Id,
}
