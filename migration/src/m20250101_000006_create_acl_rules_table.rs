use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(AclRules::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AclRules::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(AclRules::Name).string_len(255).not_null())
                    .col(ColumnDef::new(AclRules::RuleType).string_len(20).not_null())
                    .col(
                        ColumnDef::new(AclRules::ConditionField)
                            .string_len(50)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AclRules::ConditionOperator)
                            .string_len(20)
                            .not_null(),
                    )
                    .col(ColumnDef::new(AclRules::ConditionValue).text().not_null())
                    .col(ColumnDef::new(AclRules::Action).string_len(20).not_null())
                    .col(
                        ColumnDef::new(AclRules::Enabled)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(AclRules::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(AclRules::UpdatedAt)
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
            .drop_table(Table::drop().table(AclRules::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum AclRules {
    Table,
    Id,
    Name,
    RuleType,
    ConditionField,
    ConditionOperator,
    ConditionValue,
    Action,
    Enabled,
    CreatedAt,
    UpdatedAt,
}
