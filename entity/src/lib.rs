//! # Entity 模块
//!
//! 包含所有 Sea-ORM 实体定义

pub mod acl_rules;
pub mod alert_rule_channels;
pub mod alert_rules;
pub mod backup_files;
pub mod backup_schedules;
pub mod domains;
pub mod load_balancer_configs;
pub mod modsec_crs_rules;
pub mod modsec_rules;
pub mod network_load_balancers;
pub mod nginx_configs;
pub mod nlb_upstreams;
pub mod notification_channels;
pub mod slave_nodes;
pub mod ssl_certificates;
pub mod upstreams;
pub mod user_profiles;
pub mod users;

pub use acl_rules::Entity as AclRules;
pub use alert_rule_channels::Entity as AlertRuleChannels;
pub use alert_rules::Entity as AlertRules;
pub use backup_files::Entity as BackupFiles;
pub use backup_schedules::Entity as BackupSchedules;
pub use domains::Entity as Domains;
pub use load_balancer_configs::Entity as LoadBalancerConfigs;
pub use modsec_crs_rules::Entity as ModsecCrsRules;
pub use modsec_rules::Entity as ModsecRules;
pub use network_load_balancers::Entity as NetworkLoadBalancers;
pub use nginx_configs::Entity as NginxConfigs;
pub use nlb_upstreams::Entity as NlbUpstreams;
pub use notification_channels::Entity as NotificationChannels;
pub use slave_nodes::Entity as SlaveNodes;
pub use ssl_certificates::Entity as SslCertificates;
pub use upstreams::Entity as Upstreams;
pub use user_profiles::Entity as UserProfiles;
pub use users::Entity as Users;
