pub use sea_orm_migration::prelude::*;

mod m20250101_000001_create_domains_table;
mod m20250101_000002_create_upstreams_table;
mod m20250101_000003_create_load_balancer_configs_table;
mod m20250101_000004_create_ssl_certificates_table;
mod m20250101_000005_create_modsec_tables;
mod m20250101_000006_create_acl_rules_table;
mod m20250101_000007_create_users_tables;
mod m20250101_000008_create_alerting_tables;
mod m20250101_000009_create_nginx_configs_table;
mod m20250101_000010_create_network_load_balancers_tables;
mod m20250101_000011_create_backup_tables;
mod m20250101_000012_create_slave_nodes_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250101_000001_create_domains_table::Migration),
            Box::new(m20250101_000002_create_upstreams_table::Migration),
            Box::new(m20250101_000003_create_load_balancer_configs_table::Migration),
            Box::new(m20250101_000004_create_ssl_certificates_table::Migration),
            Box::new(m20250101_000005_create_modsec_tables::Migration),
            Box::new(m20250101_000006_create_acl_rules_table::Migration),
            Box::new(m20250101_000007_create_users_tables::Migration),
            Box::new(m20250101_000008_create_alerting_tables::Migration),
            Box::new(m20250101_000009_create_nginx_configs_table::Migration),
            Box::new(m20250101_000010_create_network_load_balancers_tables::Migration),
            Box::new(m20250101_000011_create_backup_tables::Migration),
            Box::new(m20250101_000012_create_slave_nodes_table::Migration),
        ]
    }
}
