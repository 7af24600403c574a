//! # 快照数据模型
//!
//! 同步快照只包含实体内容（不含数据库 id 与时间戳），JSON 键采用 camelCase；
//! 备份快照在同步内容之外附带磁盘文件、密码哈希与告警配置

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 备份文件格式版本
pub const BACKUP_FORMAT_VERSION: &str = "2.0";

/// 同步快照必须包含的数组字段
pub const REQUIRED_SYNC_ARRAYS: [&str; 7] = [
    "domains",
    "sslCertificates",
    "modsecCRSRules",
    "modsecCustomRules",
    "aclRules",
    "users",
    "networkLoadBalancers",
];

/// 同步快照
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncConfig {
    pub domains: Vec<DomainSnapshot>,
    pub ssl_certificates: Vec<SslCertificateSnapshot>,
    #[serde(rename = "modsecCRSRules")]
    pub modsec_crs_rules: Vec<CrsRuleSnapshot>,
    pub modsec_custom_rules: Vec<CustomRuleSnapshot>,
    pub acl_rules: Vec<AclRuleSnapshot>,
    pub users: Vec<UserSnapshot>,
    #[serde(default)]
    pub nginx_configs: Vec<NginxConfigSnapshot>,
    pub network_load_balancers: Vec<NlbSnapshot>,
}

/// 域名（虚拟主机）及其上游与负载均衡
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainSnapshot {
    pub name: String,
    pub status: String,
    pub ssl_enabled: bool,
    pub modsec_enabled: bool,
    #[serde(default)]
    pub upstreams: Vec<UpstreamSnapshot>,
    #[serde(default)]
    pub load_balancer: Option<LoadBalancerSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpstreamSnapshot {
    pub host: String,
    pub port: i32,
    pub protocol: String,
    pub weight: i32,
    pub max_fails: i32,
    pub fail_timeout: i32,
    pub ssl_verify: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadBalancerSnapshot {
    pub algorithm: String,
    pub health_check_enabled: bool,
    pub health_check_interval: i32,
    pub health_check_timeout: i32,
    pub health_check_path: String,
}

/// 证书，以所属域名作为关联键
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SslCertificateSnapshot {
    pub domain_name: String,
    pub common_name: String,
    #[serde(default)]
    pub sans: Vec<String>,
    pub issuer: String,
    pub certificate: String,
    pub private_key: String,
    #[serde(default)]
    pub chain: Option<String>,
    pub valid_from: DateTime<Utc>,
    pub valid_to: DateTime<Utc>,
    pub auto_renew: bool,
}

/// CRS 规则开关；`domain_name` 为空表示全局
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrsRuleSnapshot {
    pub rule_file: String,
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub description: Option<String>,
    pub enabled: bool,
    pub paranoia: i32,
    #[serde(default)]
    pub domain_name: Option<String>,
}

/// 自定义 WAF 规则
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomRuleSnapshot {
    pub name: String,
    pub category: String,
    pub rule_content: String,
    #[serde(default)]
    pub description: Option<String>,
    pub enabled: bool,
    #[serde(default)]
    pub domain_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AclRuleSnapshot {
    pub name: String,
    #[serde(rename = "type")]
    pub rule_type: String,
    pub condition: AclCondition,
    pub action: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AclCondition {
    pub field: String,
    pub operator: String,
    pub value: String,
}

/// 账号；同步快照不携带密码哈希
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSnapshot {
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub role: String,
    pub status: String,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    pub timezone: String,
    pub language: String,
    #[serde(default)]
    pub profile: Option<UserProfileSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserProfileSnapshot {
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
}

/// 全局 nginx 配置项
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NginxConfigSnapshot {
    pub name: String,
    pub config_type: String,
    pub value: String,
    pub enabled: bool,
}

/// 四层负载均衡
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NlbSnapshot {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub port: i32,
    pub protocol: String,
    pub algorithm: String,
    pub status: String,
    pub proxy_timeout: i32,
    pub proxy_connect_timeout: i32,
    pub proxy_next_upstream: bool,
    pub proxy_next_upstream_timeout: i32,
    pub proxy_next_upstream_tries: i32,
    pub health_check_enabled: bool,
    pub health_check_interval: i32,
    pub health_check_timeout: i32,
    #[serde(default)]
    pub upstreams: Vec<NlbUpstreamSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NlbUpstreamSnapshot {
    pub host: String,
    pub port: i32,
    pub weight: i32,
    pub max_fails: i32,
    pub fail_timeout: i32,
    pub max_conns: i32,
    pub backup: bool,
    pub down: bool,
}

/// 通知渠道（仅备份）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationChannelSnapshot {
    pub name: String,
    #[serde(rename = "type")]
    pub channel_type: String,
    pub enabled: bool,
    pub config: serde_json::Value,
}

/// 告警规则（仅备份），通过渠道名称关联
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertRuleSnapshot {
    pub name: String,
    pub condition: String,
    pub threshold: i32,
    pub severity: String,
    pub enabled: bool,
    #[serde(default)]
    pub channels: Vec<String>,
}

/// 完整备份快照
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupSnapshot {
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub domains: Vec<BackupDomain>,
    pub ssl_certificates: Vec<BackupCertificate>,
    #[serde(rename = "modsecCRSRules")]
    pub modsec_crs_rules: Vec<CrsRuleSnapshot>,
    pub modsec_custom_rules: Vec<CustomRuleSnapshot>,
    pub acl_rules: Vec<AclRuleSnapshot>,
    #[serde(default)]
    pub notification_channels: Vec<NotificationChannelSnapshot>,
    #[serde(default)]
    pub alert_rules: Vec<AlertRuleSnapshot>,
    pub users: Vec<UserSnapshot>,
    #[serde(default)]
    pub nginx_configs: Vec<NginxConfigSnapshot>,
    pub network_load_balancers: Vec<NlbSnapshot>,
}

/// 备份中的域名，`files` 缺失表示无法从该备份恢复 vhost 文件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupDomain {
    #[serde(flatten)]
    pub domain: DomainSnapshot,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<DomainFiles>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainFiles {
    pub vhost_config: String,
}

/// 备份中的证书，`files` 为磁盘上的 PEM 文件内容
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupCertificate {
    #[serde(flatten)]
    pub certificate: SslCertificateSnapshot,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<CertificateFiles>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateFiles {
    pub certificate: String,
    pub private_key: String,
    #[serde(default)]
    pub chain: Option<String>,
}

/// 各类实体数量，写入备份文件元数据
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotCounts {
    pub domains: usize,
    pub ssl_certificates: usize,
    pub modsec_crs_rules: usize,
    pub modsec_custom_rules: usize,
    pub acl_rules: usize,
    pub users: usize,
    pub nginx_configs: usize,
    pub network_load_balancers: usize,
    pub notification_channels: usize,
    pub alert_rules: usize,
}

impl SyncConfig {
    #[must_use]
    pub fn counts(&self) -> SnapshotCounts {
        SnapshotCounts {
            domains: self.domains.len(),
            ssl_certificates: self.ssl_certificates.len(),
            modsec_crs_rules: self.modsec_crs_rules.len(),
            modsec_custom_rules: self.modsec_custom_rules.len(),
            acl_rules: self.acl_rules.len(),
            users: self.users.len(),
            nginx_configs: self.nginx_configs.len(),
            network_load_balancers: self.network_load_balancers.len(),
            ..SnapshotCounts::default()
        }
    }
}

impl BackupSnapshot {
    #[must_use]
    pub fn counts(&self) -> SnapshotCounts {
        SnapshotCounts {
            domains: self.domains.len(),
            ssl_certificates: self.ssl_certificates.len(),
            modsec_crs_rules: self.modsec_crs_rules.len(),
            modsec_custom_rules: self.modsec_custom_rules.len(),
            acl_rules: self.acl_rules.len(),
            users: self.users.len(),
            nginx_configs: self.nginx_configs.len(),
            network_load_balancers: self.network_load_balancers.len(),
            notification_channels: self.notification_channels.len(),
            alert_rules: self.alert_rules.len(),
        }
    }

    /// 去掉备份专属内容后的同步视图
    #[must_use]
    pub fn to_sync_config(&self) -> SyncConfig {
        SyncConfig {
            domains: self.domains.iter().map(|d| d.domain.clone()).collect(),
            ssl_certificates: self
                .ssl_certificates
                .iter()
                .map(|c| c.certificate.clone())
                .collect(),
            modsec_crs_rules: self.modsec_crs_rules.clone(),
            modsec_custom_rules: self.modsec_custom_rules.clone(),
            acl_rules: self.acl_rules.clone(),
            users: self
                .users
                .iter()
                .cloned()
                .map(|mut user| {
                    user.password_hash = None;
                    user
                })
                .collect(),
            nginx_configs: self.nginx_configs.clone(),
            network_load_balancers: self.network_load_balancers.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sync_config_uses_wire_names() {
        let value = serde_json::to_value(SyncConfig::default()).unwrap();
        let object = value.as_object().unwrap();
        for key in REQUIRED_SYNC_ARRAYS {
            assert!(object.contains_key(key), "missing {key}");
        }
        assert!(object.contains_key("nginxConfigs"));
    }

    #[test]
    fn test_sync_user_omits_password_hash() {
        let user = UserSnapshot {
            username: "alice".into(),
            email: "alice@example.com".into(),
            full_name: "Alice".into(),
            role: "admin".into(),
            status: "active".into(),
            avatar: None,
            phone: None,
            timezone: "UTC".into(),
            language: "en".into(),
            profile: None,
            password_hash: None,
        };
        let value = serde_json::to_value(&user).unwrap();
        assert!(value.get("passwordHash").is_none());
        assert_eq!(value["fullName"], json!("Alice"));
    }

    #[test]
    fn test_backup_domain_flattens_content() {
        let value = json!({
            "name": "example.com",
            "status": "active",
            "sslEnabled": false,
            "modsecEnabled": true,
            "upstreams": [],
            "loadBalancer": null,
            "files": { "vhostConfig": "server {}" }
        });
        let domain: BackupDomain = serde_json::from_value(value).unwrap();
        assert_eq!(domain.domain.name, "example.com");
        assert_eq!(domain.files.unwrap().vhost_config, "server {}");
    }
}
