//! # 快照构建
//!
//! 从数据库读取全部受管实体，生成同步快照或完整备份快照

use super::model::{
    AclCondition, AclRuleSnapshot, AlertRuleSnapshot, BACKUP_FORMAT_VERSION, BackupCertificate,
    BackupDomain, BackupSnapshot, CrsRuleSnapshot, CustomRuleSnapshot, DomainFiles,
    DomainSnapshot, LoadBalancerSnapshot, NginxConfigSnapshot, NlbSnapshot, NlbUpstreamSnapshot,
    NotificationChannelSnapshot, SslCertificateSnapshot, SyncConfig, UpstreamSnapshot,
    UserProfileSnapshot, UserSnapshot,
};
use crate::error::Result;
use crate::nginx::{CertificateStore, NginxPaths};
use crate::{ldebug, lwarn, logging::{LogComponent, LogStage}};
use chrono::Utc;
use entity::{
    AclRules, AlertRuleChannels, AlertRules, Domains, LoadBalancerConfigs, ModsecCrsRules,
    ModsecRules, NetworkLoadBalancers, NginxConfigs, NlbUpstreams, NotificationChannels,
    SslCertificates, Upstreams, Users, acl_rules, alert_rules, domains, modsec_crs_rules,
    modsec_rules, network_load_balancers, nginx_configs, nlb_upstreams, notification_channels,
    upstreams, users,
};
use futures::future::join_all;
use sea_orm::{DatabaseConnection, EntityTrait, QueryOrder};
use std::collections::HashMap;
use std::sync::Arc;

/// 快照构建器
pub struct SnapshotBuilder {
    db: Arc<DatabaseConnection>,
    paths: NginxPaths,
    certs: CertificateStore,
}

impl SnapshotBuilder {
    pub fn new(db: Arc<DatabaseConnection>, paths: NginxPaths) -> Self {
        let certs = CertificateStore::new(paths.certs_dir.clone());
        Self { db, paths, certs }
    }

    /// 构建同步快照：不含 id、时间戳与密码哈希
    pub async fn build_sync_snapshot(&self) -> Result<SyncConfig> {
        let config = self.collect(false).await?;

        ldebug!(
            "system",
            LogStage::Snapshot,
            LogComponent::SnapshotBuilder,
            "build_sync",
            "同步快照构建完成",
            domains = config.domains.len(),
            users = config.users.len()
        );

        Ok(config)
    }

    /// 构建完整备份快照，附带磁盘上的 vhost 与证书文件
    pub async fn build_backup_snapshot(&self) -> Result<BackupSnapshot> {
        let config = self.collect(true).await?;
        let notification_channels = self.collect_notification_channels().await?;
        let alert_rules = self.collect_alert_rules().await?;

        let domain_reads = config.domains.into_iter().map(|domain| async move {
            let path = self.paths.available_file(&domain.name);
            let files = match tokio::fs::read_to_string(&path).await {
                Ok(vhost_config) => Some(DomainFiles { vhost_config }),
                Err(e) => {
                    lwarn!(
                        "system",
                        LogStage::Backup,
                        LogComponent::SnapshotBuilder,
                        "read_vhost",
                        "vhost 文件不可读，该域名将不带文件导出",
                        domain = %domain.name,
                        path = %path.display(),
                        error = %e
                    );
                    None
                }
            };
            BackupDomain { domain, files }
        });

        let certificate_reads = config.ssl_certificates.into_iter().map(|certificate| async move {
            let files = match self.certs.read(&certificate.domain_name).await {
                Ok(files) => Some(files),
                Err(e) => {
                    lwarn!(
                        "system",
                        LogStage::Backup,
                        LogComponent::SnapshotBuilder,
                        "read_certificate",
                        "证书文件不可读，该证书将不带文件导出",
                        domain = %certificate.domain_name,
                        error = %e
                    );
                    None
                }
            };
            BackupCertificate { certificate, files }
        });

        let (domains, ssl_certificates) =
            futures::join!(join_all(domain_reads), join_all(certificate_reads));

        Ok(BackupSnapshot {
            version: BACKUP_FORMAT_VERSION.to_string(),
            timestamp: Utc::now(),
            domains,
            ssl_certificates,
            modsec_crs_rules: config.modsec_crs_rules,
            modsec_custom_rules: config.modsec_custom_rules,
            acl_rules: config.acl_rules,
            notification_channels,
            alert_rules,
            users: config.users,
            nginx_configs: config.nginx_configs,
            network_load_balancers: config.network_load_balancers,
        })
    }

    async fn collect(&self, include_password_hash: bool) -> Result<SyncConfig> {
        let db = self.db.as_ref();

        let domain_rows = Domains::find()
            .order_by_asc(domains::Column::Id)
            .all(db)
            .await?;
        let domain_names: HashMap<i32, String> = domain_rows
            .iter()
            .map(|d| (d.id, d.name.clone()))
            .collect();

        let mut upstreams_by_domain: HashMap<i32, Vec<UpstreamSnapshot>> = HashMap::new();
        for upstream in Upstreams::find()
            .order_by_asc(upstreams::Column::Id)
            .all(db)
            .await?
        {
            upstreams_by_domain
                .entry(upstream.domain_id)
                .or_default()
                .push(UpstreamSnapshot {
                    host: upstream.host,
                    port: upstream.port,
                    protocol: upstream.protocol,
                    weight: upstream.weight,
                    max_fails: upstream.max_fails,
                    fail_timeout: upstream.fail_timeout,
                    ssl_verify: upstream.ssl_verify,
                });
        }

        let mut balancers: HashMap<i32, LoadBalancerSnapshot> = LoadBalancerConfigs::find()
            .all(db)
            .await?
            .into_iter()
            .map(|lb| {
                (
                    lb.domain_id,
                    LoadBalancerSnapshot {
                        algorithm: lb.algorithm,
                        health_check_enabled: lb.health_check_enabled,
                        health_check_interval: lb.health_check_interval,
                        health_check_timeout: lb.health_check_timeout,
                        health_check_path: lb.health_check_path,
                    },
                )
            })
            .collect();

        let domains = domain_rows
            .into_iter()
            .map(|d| DomainSnapshot {
                upstreams: upstreams_by_domain.remove(&d.id).unwrap_or_default(),
                load_balancer: balancers.remove(&d.id),
                name: d.name,
                status: d.status,
                ssl_enabled: d.ssl_enabled,
                modsec_enabled: d.modsec_enabled,
            })
            .collect();

        let ssl_certificates = SslCertificates::find()
            .all(db)
            .await?
            .into_iter()
            .filter_map(|cert| {
                let domain_name = domain_names.get(&cert.domain_id)?.clone();
                Some(SslCertificateSnapshot {
                    domain_name,
                    sans: cert.san_list(),
                    common_name: cert.common_name,
                    issuer: cert.issuer,
                    certificate: cert.certificate,
                    private_key: cert.private_key,
                    chain: cert.chain,
                    valid_from: cert.valid_from,
                    valid_to: cert.valid_to,
                    auto_renew: cert.auto_renew,
                })
            })
            .collect();

        let modsec_crs_rules = ModsecCrsRules::find()
            .order_by_asc(modsec_crs_rules::Column::Id)
            .all(db)
            .await?
            .into_iter()
            .map(|rule| CrsRuleSnapshot {
                domain_name: rule.domain_id.and_then(|id| domain_names.get(&id).cloned()),
                rule_file: rule.rule_file,
                name: rule.name,
                category: rule.category,
                description: rule.description,
                enabled: rule.enabled,
                paranoia: rule.paranoia,
            })
            .collect();

        let modsec_custom_rules = ModsecRules::find()
            .order_by_asc(modsec_rules::Column::Id)
            .all(db)
            .await?
            .into_iter()
            .map(|rule| CustomRuleSnapshot {
                domain_name: rule.domain_id.and_then(|id| domain_names.get(&id).cloned()),
                name: rule.name,
                category: rule.category,
                rule_content: rule.rule_content,
                description: rule.description,
                enabled: rule.enabled,
            })
            .collect();

        let acl_rules = AclRules::find()
            .order_by_asc(acl_rules::Column::Id)
            .all(db)
            .await?
            .into_iter()
            .map(|rule| AclRuleSnapshot {
                name: rule.name,
                rule_type: rule.rule_type,
                condition: AclCondition {
                    field: rule.condition_field,
                    operator: rule.condition_operator,
                    value: rule.condition_value,
                },
                action: rule.action,
                enabled: rule.enabled,
            })
            .collect();

        let users = Users::find()
            .find_also_related(entity::UserProfiles)
            .order_by_asc(users::Column::Id)
            .all(db)
            .await?
            .into_iter()
            .map(|(user, profile)| UserSnapshot {
                password_hash: include_password_hash.then_some(user.password_hash),
                username: user.username,
                email: user.email,
                full_name: user.full_name,
                role: user.role,
                status: user.status,
                avatar: user.avatar,
                phone: user.phone,
                timezone: user.timezone,
                language: user.language,
                profile: profile.map(|p| UserProfileSnapshot {
                    bio: p.bio,
                    location: p.location,
                    website: p.website,
                }),
            })
            .collect();

        let nginx_configs = NginxConfigs::find()
            .order_by_asc(nginx_configs::Column::Id)
            .all(db)
            .await?
            .into_iter()
            .map(|c| NginxConfigSnapshot {
                name: c.name,
                config_type: c.config_type,
                value: c.value,
                enabled: c.enabled,
            })
            .collect();

        let network_load_balancers = self.collect_network_load_balancers().await?;

        Ok(SyncConfig {
            domains,
            ssl_certificates,
            modsec_crs_rules,
            modsec_custom_rules,
            acl_rules,
            users,
            nginx_configs,
            network_load_balancers,
        })
    }

    async fn collect_network_load_balancers(&self) -> Result<Vec<NlbSnapshot>> {
        let db = self.db.as_ref();

        let mut upstreams_by_nlb: HashMap<i32, Vec<NlbUpstreamSnapshot>> = HashMap::new();
        for upstream in NlbUpstreams::find()
            .order_by_asc(nlb_upstreams::Column::Id)
            .all(db)
            .await?
        {
            upstreams_by_nlb
                .entry(upstream.nlb_id)
                .or_default()
                .push(NlbUpstreamSnapshot {
                    host: upstream.host,
                    port: upstream.port,
                    weight: upstream.weight,
                    max_fails: upstream.max_fails,
                    fail_timeout: upstream.fail_timeout,
                    max_conns: upstream.max_conns,
                    backup: upstream.backup,
                    down: upstream.down,
                });
        }

        Ok(NetworkLoadBalancers::find()
            .order_by_asc(network_load_balancers::Column::Id)
            .all(db)
            .await?
            .into_iter()
            .map(|nlb| NlbSnapshot {
                upstreams: upstreams_by_nlb.remove(&nlb.id).unwrap_or_default(),
                name: nlb.name,
                description: nlb.description,
                port: nlb.port,
                protocol: nlb.protocol,
                algorithm: nlb.algorithm,
                status: nlb.status,
                proxy_timeout: nlb.proxy_timeout,
                proxy_connect_timeout: nlb.proxy_connect_timeout,
                proxy_next_upstream: nlb.proxy_next_upstream,
                proxy_next_upstream_timeout: nlb.proxy_next_upstream_timeout,
                proxy_next_upstream_tries: nlb.proxy_next_upstream_tries,
                health_check_enabled: nlb.health_check_enabled,
                health_check_interval: nlb.health_check_interval,
                health_check_timeout: nlb.health_check_timeout,
            })
            .collect())
    }

    async fn collect_notification_channels(&self) -> Result<Vec<NotificationChannelSnapshot>> {
        Ok(NotificationChannels::find()
            .order_by_asc(notification_channels::Column::Id)
            .all(self.db.as_ref())
            .await?
            .into_iter()
            .map(|channel| NotificationChannelSnapshot {
                config: serde_json::from_str(&channel.config)
                    .unwrap_or(serde_json::Value::String(channel.config)),
                name: channel.name,
                channel_type: channel.channel_type,
                enabled: channel.enabled,
            })
            .collect())
    }

    async fn collect_alert_rules(&self) -> Result<Vec<AlertRuleSnapshot>> {
        let db = self.db.as_ref();

        let channel_names: HashMap<i32, String> = NotificationChannels::find()
            .all(db)
            .await?
            .into_iter()
            .map(|c| (c.id, c.name))
            .collect();

        let mut channels_by_rule: HashMap<i32, Vec<String>> = HashMap::new();
        for link in AlertRuleChannels::find().all(db).await? {
            if let Some(name) = channel_names.get(&link.channel_id) {
                channels_by_rule
                    .entry(link.alert_rule_id)
                    .or_default()
                    .push(name.clone());
            }
        }

        Ok(AlertRules::find()
            .order_by_asc(alert_rules::Column::Id)
            .all(db)
            .await?
            .into_iter()
            .map(|rule| {
                let mut channels = channels_by_rule.remove(&rule.id).unwrap_or_default();
                channels.sort();
                AlertRuleSnapshot {
                    name: rule.name,
                    condition: rule.condition,
                    threshold: rule.threshold,
                    severity: rule.severity,
                    enabled: rule.enabled,
                    channels,
                }
            })
            .collect())
    }
}
