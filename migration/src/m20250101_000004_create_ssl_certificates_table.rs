use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SslCertificates::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SslCertificates::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(SslCertificates::DomainId)
                            .integer()
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(SslCertificates::CommonName)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SslCertificates::Sans)
                            .text()
                            .not_null()
                            .default("[]"),
                    )
                    .col(
                        ColumnDef::new(SslCertificates::Issuer)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(ColumnDef::new(SslCertificates::Certificate).text().not_null())
                    .col(ColumnDef::new(SslCertificates::PrivateKey).text().not_null())
                    .col(ColumnDef::new(SslCertificates::Chain).text())
                    .col(
                        ColumnDef::new(SslCertificates::ValidFrom)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SslCertificates::ValidTo)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SslCertificates::AutoRenew)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(SslCertificates::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(SslCertificates::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_ssl_certificates_domain_id")
                            .from(SslCertificates::Table, SslCertificates::DomainId)
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
                    .name("idx_ssl_certificates_valid_to")
                    .table(SslCertificates::Table)
                    .col(SslCertificates::ValidTo)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SslCertificates::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum SslCertificates {
    Table,
    Id,
    DomainId,
    CommonName,
    Sans,
    Issuer,
    Certificate,
    PrivateKey,
    Chain,
    ValidFrom,
    ValidTo,
    AutoRenew,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Domains {
    Table,
    Id,
}
