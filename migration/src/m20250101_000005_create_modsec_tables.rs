use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // CRS 规则开关表
        manager
            .create_table(
                Table::create()
                    .table(ModsecCrsRules::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ModsecCrsRules::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ModsecCrsRules::RuleFile)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(ColumnDef::new(ModsecCrsRules::Name).string_len(255).not_null())
                    .col(
                        ColumnDef::new(ModsecCrsRules::Category)
                            .string_len(100)
                            .not_null(),
                    )
                    .col(ColumnDef::new(ModsecCrsRules::Description).text())
                    .col(
                        ColumnDef::new(ModsecCrsRules::Enabled)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(ModsecCrsRules::Paranoia)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .col(ColumnDef::new(ModsecCrsRules::DomainId).integer())
                    .col(
                        ColumnDef::new(ModsecCrsRules::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(ModsecCrsRules::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_modsec_crs_rules_domain_id")
                            .from(ModsecCrsRules::Table, ModsecCrsRules::DomainId)
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
                    .name("idx_modsec_crs_rules_rule_file_domain")
                    .table(ModsecCrsRules::Table)
                    .col(ModsecCrsRules::RuleFile)
                    .col(ModsecCrsRules::DomainId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // 自定义规则表
        manager
            .create_table(
                Table::create()
                    .table(ModsecRules::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ModsecRules::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ModsecRules::Name).string_len(255).not_null())
                    .col(ColumnDef::new(ModsecRules::Category).string_len(100).not_null())
                    .col(ColumnDef::new(ModsecRules::RuleContent).text().not_null())
                    .col(ColumnDef::new(ModsecRules::Description).text())
                    .col(
                        ColumnDef::new(ModsecRules::Enabled)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(ColumnDef::new(ModsecRules::DomainId).integer())
                    .col(
                        ColumnDef::new(ModsecRules::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(ModsecRules::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_modsec_rules_domain_id")
                            .from(ModsecRules::Table, ModsecRules::DomainId)
                            .to(Domains::Table, Domains::Id)
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
            .drop_table(Table::drop().table(ModsecRules::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ModsecCrsRules::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ModsecCrsRules {
    Table,
    Id,
    RuleFile,
    Name,
    Category,
    Description,
    Enabled,
    Paranoia,
    DomainId,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum ModsecRules {
    Table,
    Id,
    Name,
    Category,
    RuleContent,
    Description,
    Enabled,
    DomainId,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Domains {
    Table,
    Id,
}
