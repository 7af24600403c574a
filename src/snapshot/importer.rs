//! # 快照导入
//!
//! 按策略表顺序逐类应用快照。单个实体的失败记录为 `StepOutcome::Failed`，
//! 不中断整体导入；只有结构非法的输入会直接返回错误。
//! 导入不在跨实体事务中执行，并发读取者可能看到部分导入的状态

use super::model::{
    AclRuleSnapshot, AlertRuleSnapshot, BackupCertificate, BackupDomain, BackupSnapshot,
    CrsRuleSnapshot, CustomRuleSnapshot, NginxConfigSnapshot, NlbSnapshot,
    NotificationChannelSnapshot, REQUIRED_SYNC_ARRAYS, SyncConfig, UserSnapshot,
};
use super::policy::{EntityKind, EntityPolicy, IMPORT_POLICIES, ImportPolicy};
use super::report::{ChangeReport, StepOutcome};
use crate::error::{FleetError, Result};
use crate::nginx::{CertificateStore, validate_domain_name};
use crate::{linfo, lwarn, logging::{LogComponent, LogStage}};
use chrono::Utc;
use entity::{
    AclRules, AlertRuleChannels, AlertRules, Domains, LoadBalancerConfigs, ModsecCrsRules,
    ModsecRules, NetworkLoadBalancers, NginxConfigs, NlbUpstreams, NotificationChannels, SslCertificates,
    Upstreams, UserProfiles, Users, acl_rules, alert_rule_channels, alert_rules, domains,
    load_balancer_configs, modsec_crs_rules, modsec_rules, network_load_balancers, nginx_configs,
    nlb_upstreams, notification_channels, ssl_certificates, upstreams, user_profiles, users,
};
use rand::RngCore;
use sea_orm::{
    ActiveModelTrait, ActiveValue, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel,
    QueryFilter, Set, TransactionTrait,
};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// 单个数组元素的解码结果
pub type Decoded<T> = std::result::Result<T, String>;

/// 新建账号的占位密码哈希强度；口令随机生成且不会被使用
const PLACEHOLDER_HASH_COST: u32 = 8;

/// 待导入的实体集合
#[derive(Debug, Default)]
pub struct ImportPlan {
    pub domains: Vec<Decoded<BackupDomain>>,
    pub ssl_certificates: Vec<Decoded<BackupCertificate>>,
    pub crs_rules: Vec<Decoded<CrsRuleSnapshot>>,
    pub custom_rules: Vec<Decoded<CustomRuleSnapshot>>,
    pub acl_rules: Vec<Decoded<AclRuleSnapshot>>,
    pub users: Vec<Decoded<UserSnapshot>>,
    pub nginx_configs: Vec<Decoded<NginxConfigSnapshot>>,
    pub network_load_balancers: Vec<Decoded<NlbSnapshot>>,
    pub notification_channels: Vec<Decoded<NotificationChannelSnapshot>>,
    pub alert_rules: Vec<Decoded<AlertRuleSnapshot>>,
    /// 备份恢复会额外导入 `backup_only` 实体
    pub backup: bool,
}

impl ImportPlan {
    #[must_use]
    pub fn from_sync(config: &SyncConfig) -> Self {
        Self {
            domains: config
                .domains
                .iter()
                .map(|domain| {
                    Ok(BackupDomain {
                        domain: domain.clone(),
                        files: None,
                    })
                })
                .collect(),
            ssl_certificates: config
                .ssl_certificates
                .iter()
                .map(|certificate| {
                    Ok(BackupCertificate {
                        certificate: certificate.clone(),
                        files: None,
                    })
                })
                .collect(),
            crs_rules: all_ok(&config.modsec_crs_rules),
            custom_rules: all_ok(&config.modsec_custom_rules),
            acl_rules: all_ok(&config.acl_rules),
            users: all_ok(&config.users),
            nginx_configs: all_ok(&config.nginx_configs),
            network_load_balancers: all_ok(&config.network_load_balancers),
            notification_channels: Vec::new(),
            alert_rules: Vec::new(),
            backup: false,
        }
    }

    #[must_use]
    pub fn from_backup(snapshot: &BackupSnapshot) -> Self {
        Self {
            domains: all_ok(&snapshot.domains),
            ssl_certificates: all_ok(&snapshot.ssl_certificates),
            crs_rules: all_ok(&snapshot.modsec_crs_rules),
            custom_rules: all_ok(&snapshot.modsec_custom_rules),
            acl_rules: all_ok(&snapshot.acl_rules),
            users: all_ok(&snapshot.users),
            nginx_configs: all_ok(&snapshot.nginx_configs),
            network_load_balancers: all_ok(&snapshot.network_load_balancers),
            notification_channels: all_ok(&snapshot.notification_channels),
            alert_rules: all_ok(&snapshot.alert_rules),
            backup: true,
        }
    }

    /// 校验顶层结构后逐个元素解码；同步载荷中的备份专属字段被忽略
    pub fn from_sync_value(value: &Value) -> Result<Self> {
        let object = validate_structure(value)?;
        Ok(Self {
            notification_channels: Vec::new(),
            alert_rules: Vec::new(),
            ..Self::decode(object, false)
        })
    }

    /// 校验顶层结构后逐个元素解码，包含告警配置
    pub fn from_backup_value(value: &Value) -> Result<Self> {
        let object = validate_structure(value)?;
        Ok(Self::decode(object, true))
    }

    fn decode(object: &Map<String, Value>, backup: bool) -> Self {
        Self {
            domains: decode_array(object, "domains"),
            ssl_certificates: decode_array(object, "sslCertificates"),
            crs_rules: decode_array(object, "modsecCRSRules"),
            custom_rules: decode_array(object, "modsecCustomRules"),
            acl_rules: decode_array(object, "aclRules"),
            users: decode_array(object, "users"),
            nginx_configs: decode_array(object, "nginxConfigs"),
            network_load_balancers: decode_array(object, "networkLoadBalancers"),
            notification_channels: decode_array(object, "notificationChannels"),
            alert_rules: decode_array(object, "alertRules"),
            backup,
        }
    }
}

fn all_ok<T: Clone>(items: &[T]) -> Vec<Decoded<T>> {
    items.iter().cloned().map(Ok).collect()
}

fn validate_structure(value: &Value) -> Result<&Map<String, Value>> {
    let object = value
        .as_object()
        .ok_or_else(|| FleetError::validation("快照必须是 JSON 对象"))?;

    for key in REQUIRED_SYNC_ARRAYS {
        if !object.get(key).is_some_and(Value::is_array) {
            return Err(FleetError::validation(format!("快照缺少数组字段: {key}")));
        }
    }

    Ok(object)
}

fn decode_array<T: DeserializeOwned>(object: &Map<String, Value>, key: &str) -> Vec<Decoded<T>> {
    object
        .get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .map(|item| T::deserialize(item).map_err(|e| format!("无法解析: {e}")))
                .collect()
        })
        .unwrap_or_default()
}

/// 仅在值不同时标记字段为已修改
fn assign<V>(field: &mut ActiveValue<V>, value: V)
where
    V: Into<sea_orm::Value> + PartialEq,
{
    if !matches!(field, ActiveValue::Unchanged(current) if *current == value) {
        *field = ActiveValue::Set(value);
    }
}

fn unchanged() -> StepOutcome {
    StepOutcome::Skipped("unchanged".to_string())
}

fn failed(error: FleetError) -> StepOutcome {
    StepOutcome::Failed(error.to_string())
}

/// 导入过程中按名称解析出的本地 id
#[derive(Default)]
struct ImportState {
    report: ChangeReport,
    domain_ids: HashMap<String, i32>,
    nlb_ids: HashMap<String, i32>,
}

impl ImportState {
    fn record(&mut self, kind: EntityKind, key: &str, outcome: StepOutcome) {
        if let StepOutcome::Failed(reason) = &outcome {
            lwarn!(
                "system",
                LogStage::Import,
                LogComponent::Importer,
                "import_entity",
                "实体导入失败，已跳过",
                kind = %kind,
                key = %key,
                reason = %reason
            );
        }
        self.report.record(kind, key, &outcome);
    }
}

/// 快照导入器
pub struct ReconciliationImporter {
    db: Arc<DatabaseConnection>,
    certs: CertificateStore,
    policies: &'static [EntityPolicy],
}

impl ReconciliationImporter {
    pub fn new(db: Arc<DatabaseConnection>, certs: CertificateStore) -> Self {
        Self::with_policies(db, certs, &IMPORT_POLICIES)
    }

    /// 使用自定义策略表；表中未列出的实体类型不会被导入
    pub fn with_policies(
        db: Arc<DatabaseConnection>,
        certs: CertificateStore,
        policies: &'static [EntityPolicy],
    ) -> Self {
        Self { db, certs, policies }
    }

    /// 导入未经类型化的同步快照
    pub async fn import_value(&self, value: &Value) -> Result<ChangeReport> {
        let plan = ImportPlan::from_sync_value(value)?;
        Ok(self.apply(plan).await)
    }

    pub async fn import_sync(&self, config: &SyncConfig) -> ChangeReport {
        self.apply(ImportPlan::from_sync(config)).await
    }

    pub async fn import_backup(&self, snapshot: &BackupSnapshot) -> ChangeReport {
        self.apply(ImportPlan::from_backup(snapshot)).await
    }

    /// 按策略表顺序应用导入计划
    pub async fn apply(&self, plan: ImportPlan) -> ChangeReport {
        let mut state = ImportState::default();
        let backup = plan.backup;

        let domains = collect_decoded(&mut state, EntityKind::Domain, plan.domains);
        let certificates = collect_decoded(&mut state, EntityKind::SslCertificate, plan.ssl_certificates);
        let crs_rules = collect_decoded(&mut state, EntityKind::CrsRule, plan.crs_rules);
        let custom_rules = collect_decoded(&mut state, EntityKind::CustomRule, plan.custom_rules);
        let acl_rules = collect_decoded(&mut state, EntityKind::AclRule, plan.acl_rules);
        let users = collect_decoded(&mut state, EntityKind::User, plan.users);
        let nginx_configs = collect_decoded(&mut state, EntityKind::NginxConfig, plan.nginx_configs);
        let nlbs = collect_decoded(&mut state, EntityKind::NetworkLoadBalancer, plan.network_load_balancers);
        let channels = collect_decoded(&mut state, EntityKind::NotificationChannel, plan.notification_channels);
        let alert_rules = collect_decoded(&mut state, EntityKind::AlertRule, plan.alert_rules);

        for entry in self.policies {
            if entry.backup_only && !backup {
                continue;
            }
            state.report.begin(entry.kind);
            let policy = entry.policy;

            match entry.kind {
                EntityKind::Domain => self.domain_step(&mut state, &domains, policy).await,
                EntityKind::Upstream => self.upstream_step(&mut state, &domains, policy).await,
                EntityKind::LoadBalancer => self.load_balancer_step(&mut state, &domains, policy).await,
                EntityKind::SslCertificate => self.certificate_step(&mut state, &certificates, policy).await,
                EntityKind::CrsRule => self.crs_rule_step(&mut state, &crs_rules, policy).await,
                EntityKind::CustomRule => self.custom_rule_step(&mut state, &custom_rules, policy).await,
                EntityKind::AclRule => {
                    for rule in &acl_rules {
                        let outcome = self.import_acl_rule(rule, policy).await.unwrap_or_else(failed);
                        state.record(EntityKind::AclRule, &rule.name, outcome);
                    }
                }
                EntityKind::User => {
                    for user in &users {
                        let outcome = self.upsert_user(user, policy).await.unwrap_or_else(failed);
                        state.record(EntityKind::User, &user.username, outcome);
                    }
                }
                EntityKind::NginxConfig => {
                    for config in &nginx_configs {
                        let outcome = self.upsert_nginx_config(config, policy).await.unwrap_or_else(failed);
                        state.record(EntityKind::NginxConfig, &config.name, outcome);
                    }
                }
                EntityKind::NetworkLoadBalancer => {
                    for nlb in &nlbs {
                        match self.upsert_nlb(nlb, policy).await {
                            Ok((id, outcome)) => {
                                state.nlb_ids.insert(nlb.name.clone(), id);
                                state.record(EntityKind::NetworkLoadBalancer, &nlb.name, outcome);
                            }
                            Err(e) => state.record(EntityKind::NetworkLoadBalancer, &nlb.name, failed(e)),
                        }
                    }
                }
                EntityKind::NlbUpstream => {
                    for nlb in &nlbs {
                        let outcome = match state.nlb_ids.get(&nlb.name) {
                            Some(&id) => self.write_nlb_upstreams(id, nlb, policy).await.unwrap_or_else(failed),
                            None => StepOutcome::Skipped("network load balancer not imported".to_string()),
                        };
                        state.record(EntityKind::NlbUpstream, &nlb.name, outcome);
                    }
                }
                EntityKind::NotificationChannel => {
                    for channel in &channels {
                        let outcome = self
                            .upsert_notification_channel(channel, policy)
                            .await
                            .unwrap_or_else(failed);
                        state.record(EntityKind::NotificationChannel, &channel.name, outcome);
                    }
                }
                EntityKind::AlertRule => {
                    for rule in &alert_rules {
                        let outcome = self.upsert_alert_rule(rule, policy).await.unwrap_or_else(failed);
                        state.record(EntityKind::AlertRule, &rule.name, outcome);
                    }
                }
            }
        }

        let report = state.report;
        linfo!(
            "system",
            LogStage::Import,
            LogComponent::Importer,
            "import_snapshot",
            "快照导入完成",
            total_changes = report.total_changes(),
            failures = report.failures().len()
        );
        report
    }

    async fn domain_step(&self, state: &mut ImportState, domains: &[BackupDomain], policy: ImportPolicy) {
        for domain in domains {
            let name = &domain.domain.name;
            match self.upsert_domain(domain, policy).await {
                Ok((id, outcome)) => {
                    state.domain_ids.insert(name.clone(), id);
                    state.record(EntityKind::Domain, name, outcome);
                }
                Err(e) => state.record(EntityKind::Domain, name, failed(e)),
            }
        }
    }

    async fn upstream_step(&self, state: &mut ImportState, domains: &[BackupDomain], policy: ImportPolicy) {
        for domain in domains {
            let name = &domain.domain.name;
            let outcome = match state.domain_ids.get(name) {
                Some(&id) => self.write_upstreams(id, domain, policy).await.unwrap_or_else(failed),
                None => StepOutcome::Skipped("domain not imported".to_string()),
            };
            state.record(EntityKind::Upstream, name, outcome);
        }
    }

    async fn load_balancer_step(&self, state: &mut ImportState, domains: &[BackupDomain], policy: ImportPolicy) {
        for domain in domains {
            let name = &domain.domain.name;
            let Some(&id) = state.domain_ids.get(name) else {
                continue;
            };
            if domain.domain.load_balancer.is_some() {
                let outcome = self
                    .upsert_load_balancer(id, domain, policy)
                    .await
                    .unwrap_or_else(failed);
                state.record(EntityKind::LoadBalancer, name, outcome);
            }
        }
    }

    async fn certificate_step(
        &self,
        state: &mut ImportState,
        certificates: &[BackupCertificate],
        policy: ImportPolicy,
    ) {
        for certificate in certificates {
            let name = &certificate.certificate.domain_name;
            let outcome = match validate_domain_name(name) {
                Err(e) => failed(e),
                Ok(()) => match self.resolve_domain(state, name).await {
                    Ok(Some(id)) => self
                        .upsert_certificate(id, certificate, policy)
                        .await
                        .unwrap_or_else(failed),
                    Ok(None) => StepOutcome::Failed(format!("unknown domain {name}")),
                    Err(e) => failed(e),
                },
            };
            state.record(EntityKind::SslCertificate, name, outcome);
        }
    }

    async fn crs_rule_step(&self, state: &mut ImportState, rules: &[CrsRuleSnapshot], policy: ImportPolicy) {
        for rule in rules {
            let key = format!("{}@{}", rule.rule_file, rule.domain_name.as_deref().unwrap_or("global"));
            let outcome = match self.resolve_optional_domain(state, rule.domain_name.as_deref()).await {
                Ok(domain_id) => self
                    .upsert_crs_rule(domain_id, rule, policy)
                    .await
                    .unwrap_or_else(failed),
                Err(e) => failed(e),
            };
            state.record(EntityKind::CrsRule, &key, outcome);
        }
    }

    async fn custom_rule_step(&self, state: &mut ImportState, rules: &[CustomRuleSnapshot], policy: ImportPolicy) {
        for rule in rules {
            let outcome = match self.resolve_optional_domain(state, rule.domain_name.as_deref()).await {
                Ok(domain_id) => self
                    .import_custom_rule(domain_id, rule, policy)
                    .await
                    .unwrap_or_else(failed),
                Err(e) => failed(e),
            };
            state.record(EntityKind::CustomRule, &rule.name, outcome);
        }
    }

    async fn resolve_domain(&self, state: &mut ImportState, name: &str) -> Result<Option<i32>> {
        if let Some(&id) = state.domain_ids.get(name) {
            return Ok(Some(id));
        }
        let found = Domains::find()
            .filter(domains::Column::Name.eq(name))
            .one(self.db.as_ref())
            .await?;
        if let Some(domain) = &found {
            state.domain_ids.insert(name.to_string(), domain.id);
        }
        Ok(found.map(|d| d.id))
    }

    /// `None` 表示全局；指定了但找不到的域名是错误
    async fn resolve_optional_domain(
        &self,
        state: &mut ImportState,
        name: Option<&str>,
    ) -> Result<Option<i32>> {
        let Some(name) = name else {
            return Ok(None);
        };
        self.resolve_domain(state, name)
            .await?
            .map(Some)
            .ok_or_else(|| FleetError::not_found("domain", name))
    }

    async fn upsert_domain(&self, item: &BackupDomain, policy: ImportPolicy) -> Result<(i32, StepOutcome)> {
        let db = self.db.as_ref();
        let domain = &item.domain;
        let now = Utc::now();
        validate_domain_name(&domain.name)?;

        let existing = match policy {
            ImportPolicy::Upsert => {
                Domains::find()
                    .filter(domains::Column::Name.eq(&domain.name))
                    .one(db)
                    .await?
            }
            _ => None,
        };

        if let Some(existing) = existing {
            let id = existing.id;
            let mut active = existing.into_active_model();
            assign(&mut active.status, domain.status.clone());
            assign(&mut active.ssl_enabled, domain.ssl_enabled);
            assign(&mut active.modsec_enabled, domain.modsec_enabled);
            if !active.is_changed() {
                return Ok((id, unchanged()));
            }
            active.updated_at = Set(now);
            active.update(db).await?;
            return Ok((id, StepOutcome::Updated));
        }

        let model = domains::ActiveModel {
            name: Set(domain.name.clone()),
            status: Set(domain.status.clone()),
            ssl_enabled: Set(domain.ssl_enabled),
            modsec_enabled: Set(domain.modsec_enabled),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await?;

        Ok((model.id, StepOutcome::Created))
    }

    /// `ReplaceChildren` 先清空域名下的上游；其余策略只追加
    async fn write_upstreams(&self, domain_id: i32, item: &BackupDomain, policy: ImportPolicy) -> Result<StepOutcome> {
        let txn = self.db.begin().await?;
        if policy == ImportPolicy::ReplaceChildren {
            Upstreams::delete_many()
                .filter(upstreams::Column::DomainId.eq(domain_id))
                .exec(&txn)
                .await?;
        }

        let now = Utc::now();
        for upstream in &item.domain.upstreams {
            upstreams::ActiveModel {
                domain_id: Set(domain_id),
                host: Set(upstream.host.clone()),
                port: Set(upstream.port),
                protocol: Set(upstream.protocol.clone()),
                weight: Set(upstream.weight),
                max_fails: Set(upstream.max_fails),
                fail_timeout: Set(upstream.fail_timeout),
                ssl_verify: Set(upstream.ssl_verify),
                created_at: Set(now),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
        }
        txn.commit().await?;

        Ok(StepOutcome::Replaced(item.domain.upstreams.len()))
    }

    async fn upsert_load_balancer(
        &self,
        domain_id: i32,
        item: &BackupDomain,
        policy: ImportPolicy,
    ) -> Result<StepOutcome> {
        let Some(lb) = &item.domain.load_balancer else {
            return Ok(StepOutcome::Skipped("no load balancer".to_string()));
        };
        let db = self.db.as_ref();
        let now = Utc::now();

        let existing = match policy {
            ImportPolicy::Upsert => {
                LoadBalancerConfigs::find()
                    .filter(load_balancer_configs::Column::DomainId.eq(domain_id))
                    .one(db)
                    .await?
            }
            _ => None,
        };

        if let Some(existing) = existing {
            let mut active = existing.into_active_model();
            assign(&mut active.algorithm, lb.algorithm.clone());
            assign(&mut active.health_check_enabled, lb.health_check_enabled);
            assign(&mut active.health_check_interval, lb.health_check_interval);
            assign(&mut active.health_check_timeout, lb.health_check_timeout);
            assign(&mut active.health_check_path, lb.health_check_path.clone());
            if !active.is_changed() {
                return Ok(unchanged());
            }
            active.updated_at = Set(now);
            active.update(db).await?;
            return Ok(StepOutcome::Updated);
        }

        load_balancer_configs::ActiveModel {
            domain_id: Set(domain_id),
            algorithm: Set(lb.algorithm.clone()),
            health_check_enabled: Set(lb.health_check_enabled),
            health_check_interval: Set(lb.health_check_interval),
            health_check_timeout: Set(lb.health_check_timeout),
            health_check_path: Set(lb.health_check_path.clone()),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await?;

        Ok(StepOutcome::Created)
    }

    async fn upsert_certificate(
        &self,
        domain_id: i32,
        item: &BackupCertificate,
        policy: ImportPolicy,
    ) -> Result<StepOutcome> {
        let db = self.db.as_ref();
        let cert = &item.certificate;
        let now = Utc::now();
        let sans = serde_json::to_string(&cert.sans)?;

        let existing = match policy {
            ImportPolicy::Upsert => {
                SslCertificates::find()
                    .filter(ssl_certificates::Column::DomainId.eq(domain_id))
                    .one(db)
                    .await?
            }
            _ => None,
        };

        let outcome = if let Some(existing) = existing {
            let mut active = existing.into_active_model();
            assign(&mut active.common_name, cert.common_name.clone());
            assign(&mut active.sans, sans);
            assign(&mut active.issuer, cert.issuer.clone());
            assign(&mut active.certificate, cert.certificate.clone());
            assign(&mut active.private_key, cert.private_key.clone());
            assign(&mut active.chain, cert.chain.clone());
            assign(&mut active.valid_from, cert.valid_from);
            assign(&mut active.valid_to, cert.valid_to);
            assign(&mut active.auto_renew, cert.auto_renew);
            if active.is_changed() {
                active.updated_at = Set(now);
                active.update(db).await?;
                StepOutcome::Updated
            } else {
                unchanged()
            }
        } else {
            ssl_certificates::ActiveModel {
                domain_id: Set(domain_id),
                common_name: Set(cert.common_name.clone()),
                sans: Set(sans),
                issuer: Set(cert.issuer.clone()),
                certificate: Set(cert.certificate.clone()),
                private_key: Set(cert.private_key.clone()),
                chain: Set(cert.chain.clone()),
                valid_from: Set(cert.valid_from),
                valid_to: Set(cert.valid_to),
                auto_renew: Set(cert.auto_renew),
                created_at: Set(now),
                updated_at: Set(now),
                ..Default::default()
            }
            .insert(db)
            .await?;
            StepOutcome::Created
        };

        // 备份中的磁盘文件优先于数据库中的 PEM
        let (pem, key, chain) = item.files.as_ref().map_or(
            (cert.certificate.as_str(), cert.private_key.as_str(), cert.chain.as_deref()),
            |files| (files.certificate.as_str(), files.private_key.as_str(), files.chain.as_deref()),
        );
        if let Err(e) = self.certs.write(&cert.domain_name, pem, key, chain).await {
            return Ok(StepOutcome::Failed(format!("证书文件写入失败: {e}")));
        }

        Ok(outcome)
    }

    async fn upsert_crs_rule(
        &self,
        domain_id: Option<i32>,
        rule: &CrsRuleSnapshot,
        policy: ImportPolicy,
    ) -> Result<StepOutcome> {
        let db = self.db.as_ref();
        let now = Utc::now();

        let existing = match policy {
            ImportPolicy::Upsert => {
                ModsecCrsRules::find()
                    .filter(modsec_crs_rules::Column::RuleFile.eq(&rule.rule_file))
                    .filter(match domain_id {
                        Some(id) => modsec_crs_rules::Column::DomainId.eq(id),
                        None => modsec_crs_rules::Column::DomainId.is_null(),
                    })
                    .one(db)
                    .await?
            }
            _ => None,
        };

        if let Some(existing) = existing {
            let mut active = existing.into_active_model();
            assign(&mut active.name, rule.name.clone());
            assign(&mut active.category, rule.category.clone());
            assign(&mut active.description, rule.description.clone());
            assign(&mut active.enabled, rule.enabled);
            assign(&mut active.paranoia, rule.paranoia);
            if !active.is_changed() {
                return Ok(unchanged());
            }
            active.updated_at = Set(now);
            active.update(db).await?;
            return Ok(StepOutcome::Updated);
        }

        modsec_crs_rules::ActiveModel {
            rule_file: Set(rule.rule_file.clone()),
            name: Set(rule.name.clone()),
            category: Set(rule.category.clone()),
            description: Set(rule.description.clone()),
            enabled: Set(rule.enabled),
            paranoia: Set(rule.paranoia),
            domain_id: Set(domain_id),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await?;

        Ok(StepOutcome::Created)
    }

    /// 默认只新建；`Upsert` 按名称与所属域名匹配
    async fn import_custom_rule(
        &self,
        domain_id: Option<i32>,
        rule: &CustomRuleSnapshot,
        policy: ImportPolicy,
    ) -> Result<StepOutcome> {
        let db = self.db.as_ref();
        let now = Utc::now();

        let existing = match policy {
            ImportPolicy::Upsert => {
                ModsecRules::find()
                    .filter(modsec_rules::Column::Name.eq(&rule.name))
                    .filter(match domain_id {
                        Some(id) => modsec_rules::Column::DomainId.eq(id),
                        None => modsec_rules::Column::DomainId.is_null(),
                    })
                    .one(db)
                    .await?
            }
            _ => None,
        };

        if let Some(existing) = existing {
            let mut active = existing.into_active_model();
            assign(&mut active.category, rule.category.clone());
            assign(&mut active.rule_content, rule.rule_content.clone());
            assign(&mut active.description, rule.description.clone());
            assign(&mut active.enabled, rule.enabled);
            if !active.is_changed() {
                return Ok(unchanged());
            }
            active.updated_at = Set(now);
            active.update(db).await?;
            return Ok(StepOutcome::Updated);
        }

        modsec_rules::ActiveModel {
            name: Set(rule.name.clone()),
            category: Set(rule.category.clone()),
            rule_content: Set(rule.rule_content.clone()),
            description: Set(rule.description.clone()),
            enabled: Set(rule.enabled),
            domain_id: Set(domain_id),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await?;

        Ok(StepOutcome::Created)
    }

    /// 默认只新建；`Upsert` 按类型与匹配条件查找
    async fn import_acl_rule(&self, rule: &AclRuleSnapshot, policy: ImportPolicy) -> Result<StepOutcome> {
        let db = self.db.as_ref();
        let now = Utc::now();

        let existing = match policy {
            ImportPolicy::Upsert => {
                AclRules::find()
                    .filter(acl_rules::Column::Name.eq(&rule.name))
                    .filter(acl_rules::Column::RuleType.eq(&rule.rule_type))
                    .filter(acl_rules::Column::ConditionField.eq(&rule.condition.field))
                    .filter(acl_rules::Column::ConditionOperator.eq(&rule.condition.operator))
                    .filter(acl_rules::Column::ConditionValue.eq(&rule.condition.value))
                    .one(db)
                    .await?
            }
            _ => None,
        };

        if let Some(existing) = existing {
            let mut active = existing.into_active_model();
            assign(&mut active.action, rule.action.clone());
            assign(&mut active.enabled, rule.enabled);
            if !active.is_changed() {
                return Ok(unchanged());
            }
            active.updated_at = Set(now);
            active.update(db).await?;
            return Ok(StepOutcome::Updated);
        }

        acl_rules::ActiveModel {
            name: Set(rule.name.clone()),
            rule_type: Set(rule.rule_type.clone()),
            condition_field: Set(rule.condition.field.clone()),
            condition_operator: Set(rule.condition.operator.clone()),
            condition_value: Set(rule.condition.value.clone()),
            action: Set(rule.action.clone()),
            enabled: Set(rule.enabled),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await?;

        Ok(StepOutcome::Created)
    }

    /// 已存在的账号不会覆盖密码
    async fn upsert_user(&self, user: &UserSnapshot, policy: ImportPolicy) -> Result<StepOutcome> {
        let db = self.db.as_ref();
        let now = Utc::now();

        let existing = match policy {
            ImportPolicy::Upsert => {
                Users::find()
                    .filter(users::Column::Username.eq(&user.username))
                    .one(db)
                    .await?
            }
            _ => None,
        };

        let (user_id, outcome) = if let Some(existing) = existing {
            let id = existing.id;
            let mut active = existing.into_active_model();
            assign(&mut active.email, user.email.clone());
            assign(&mut active.full_name, user.full_name.clone());
            assign(&mut active.role, user.role.clone());
            assign(&mut active.status, user.status.clone());
            assign(&mut active.avatar, user.avatar.clone());
            assign(&mut active.phone, user.phone.clone());
            assign(&mut active.timezone, user.timezone.clone());
            assign(&mut active.language, user.language.clone());
            if active.is_changed() {
                active.updated_at = Set(now);
                active.update(db).await?;
                (id, StepOutcome::Updated)
            } else {
                (id, unchanged())
            }
        } else {
            let password_hash = match &user.password_hash {
                Some(hash) => hash.clone(),
                None => placeholder_password_hash().await?,
            };
            let model = users::ActiveModel {
                username: Set(user.username.clone()),
                email: Set(user.email.clone()),
                password_hash: Set(password_hash),
                full_name: Set(user.full_name.clone()),
                role: Set(user.role.clone()),
                status: Set(user.status.clone()),
                avatar: Set(user.avatar.clone()),
                phone: Set(user.phone.clone()),
                timezone: Set(user.timezone.clone()),
                language: Set(user.language.clone()),
                created_at: Set(now),
                updated_at: Set(now),
                ..Default::default()
            }
            .insert(db)
            .await?;
            (model.id, StepOutcome::Created)
        };

        let Some(profile) = &user.profile else {
            return Ok(outcome);
        };

        let existing = UserProfiles::find()
            .filter(user_profiles::Column::UserId.eq(user_id))
            .one(db)
            .await?;
        let profile_changed = if let Some(existing) = existing {
            let mut active = existing.into_active_model();
            assign(&mut active.bio, profile.bio.clone());
            assign(&mut active.location, profile.location.clone());
            assign(&mut active.website, profile.website.clone());
            let changed = active.is_changed();
            if changed {
                active.updated_at = Set(now);
                active.update(db).await?;
            }
            changed
        } else {
            user_profiles::ActiveModel {
                user_id: Set(user_id),
                bio: Set(profile.bio.clone()),
                location: Set(profile.location.clone()),
                website: Set(profile.website.clone()),
                created_at: Set(now),
                updated_at: Set(now),
                ..Default::default()
            }
            .insert(db)
            .await?;
            true
        };

        Ok(match outcome {
            StepOutcome::Skipped(_) if profile_changed => StepOutcome::Updated,
            other => other,
        })
    }

    async fn upsert_nginx_config(&self, config: &NginxConfigSnapshot, policy: ImportPolicy) -> Result<StepOutcome> {
        let db = self.db.as_ref();
        let now = Utc::now();

        let existing = match policy {
            ImportPolicy::Upsert => {
                NginxConfigs::find()
                    .filter(nginx_configs::Column::Name.eq(&config.name))
                    .one(db)
                    .await?
            }
            _ => None,
        };

        if let Some(existing) = existing {
            let mut active = existing.into_active_model();
            assign(&mut active.config_type, config.config_type.clone());
            assign(&mut active.value, config.value.clone());
            assign(&mut active.enabled, config.enabled);
            if !active.is_changed() {
                return Ok(unchanged());
            }
            active.updated_at = Set(now);
            active.update(db).await?;
            return Ok(StepOutcome::Updated);
        }

        nginx_configs::ActiveModel {
            name: Set(config.name.clone()),
            config_type: Set(config.config_type.clone()),
            value: Set(config.value.clone()),
            enabled: Set(config.enabled),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await?;

        Ok(StepOutcome::Created)
    }

    async fn upsert_nlb(&self, nlb: &NlbSnapshot, policy: ImportPolicy) -> Result<(i32, StepOutcome)> {
        let db = self.db.as_ref();
        let now = Utc::now();

        let existing = match policy {
            ImportPolicy::Upsert => {
                NetworkLoadBalancers::find()
                    .filter(network_load_balancers::Column::Name.eq(&nlb.name))
                    .one(db)
                    .await?
            }
            _ => None,
        };

        if let Some(existing) = existing {
            let id = existing.id;
            let mut active = existing.into_active_model();
            assign(&mut active.description, nlb.description.clone());
            assign(&mut active.port, nlb.port);
            assign(&mut active.protocol, nlb.protocol.clone());
            assign(&mut active.algorithm, nlb.algorithm.clone());
            assign(&mut active.status, nlb.status.clone());
            assign(&mut active.proxy_timeout, nlb.proxy_timeout);
            assign(&mut active.proxy_connect_timeout, nlb.proxy_connect_timeout);
            assign(&mut active.proxy_next_upstream, nlb.proxy_next_upstream);
            assign(&mut active.proxy_next_upstream_timeout, nlb.proxy_next_upstream_timeout);
            assign(&mut active.proxy_next_upstream_tries, nlb.proxy_next_upstream_tries);
            assign(&mut active.health_check_enabled, nlb.health_check_enabled);
            assign(&mut active.health_check_interval, nlb.health_check_interval);
            assign(&mut active.health_check_timeout, nlb.health_check_timeout);
            if !active.is_changed() {
                return Ok((id, unchanged()));
            }
            active.updated_at = Set(now);
            active.update(db).await?;
            return Ok((id, StepOutcome::Updated));
        }

        let model = network_load_balancers::ActiveModel {
            name: Set(nlb.name.clone()),
            description: Set(nlb.description.clone()),
            port: Set(nlb.port),
            protocol: Set(nlb.protocol.clone()),
            algorithm: Set(nlb.algorithm.clone()),
            status: Set(nlb.status.clone()),
            proxy_timeout: Set(nlb.proxy_timeout),
            proxy_connect_timeout: Set(nlb.proxy_connect_timeout),
            proxy_next_upstream: Set(nlb.proxy_next_upstream),
            proxy_next_upstream_timeout: Set(nlb.proxy_next_upstream_timeout),
            proxy_next_upstream_tries: Set(nlb.proxy_next_upstream_tries),
            health_check_enabled: Set(nlb.health_check_enabled),
            health_check_interval: Set(nlb.health_check_interval),
            health_check_timeout: Set(nlb.health_check_timeout),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await?;

        Ok((model.id, StepOutcome::Created))
    }

    async fn write_nlb_upstreams(&self, nlb_id: i32, nlb: &NlbSnapshot, policy: ImportPolicy) -> Result<StepOutcome> {
        let txn = self.db.begin().await?;
        if policy == ImportPolicy::ReplaceChildren {
            NlbUpstreams::delete_many()
                .filter(nlb_upstreams::Column::NlbId.eq(nlb_id))
                .exec(&txn)
                .await?;
        }

        let now = Utc::now();
        for upstream in &nlb.upstreams {
            nlb_upstreams::ActiveModel {
                nlb_id: Set(nlb_id),
                host: Set(upstream.host.clone()),
                port: Set(upstream.port),
                weight: Set(upstream.weight),
                max_fails: Set(upstream.max_fails),
                fail_timeout: Set(upstream.fail_timeout),
                max_conns: Set(upstream.max_conns),
                backup: Set(upstream.backup),
                down: Set(upstream.down),
                created_at: Set(now),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
        }
        txn.commit().await?;

        Ok(StepOutcome::Replaced(nlb.upstreams.len()))
    }

    async fn upsert_notification_channel(
        &self,
        channel: &NotificationChannelSnapshot,
        policy: ImportPolicy,
    ) -> Result<StepOutcome> {
        let db = self.db.as_ref();
        let now = Utc::now();
        let config = serde_json::to_string(&channel.config)?;

        let existing = match policy {
            ImportPolicy::Upsert => {
                NotificationChannels::find()
                    .filter(notification_channels::Column::Name.eq(&channel.name))
                    .one(db)
                    .await?
            }
            _ => None,
        };

        if let Some(existing) = existing {
            let mut active = existing.into_active_model();
            assign(&mut active.channel_type, channel.channel_type.clone());
            assign(&mut active.enabled, channel.enabled);
            assign(&mut active.config, config);
            if !active.is_changed() {
                return Ok(unchanged());
            }
            active.updated_at = Set(now);
            active.update(db).await?;
            return Ok(StepOutcome::Updated);
        }

        notification_channels::ActiveModel {
            name: Set(channel.name.clone()),
            channel_type: Set(channel.channel_type.clone()),
            enabled: Set(channel.enabled),
            config: Set(config),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await?;

        Ok(StepOutcome::Created)
    }

    /// 规则按名称 upsert，渠道关联整体替换
    async fn upsert_alert_rule(&self, rule: &AlertRuleSnapshot, policy: ImportPolicy) -> Result<StepOutcome> {
        let db = self.db.as_ref();
        let now = Utc::now();

        let existing = match policy {
            ImportPolicy::Upsert => {
                AlertRules::find()
                    .filter(alert_rules::Column::Name.eq(&rule.name))
                    .one(db)
                    .await?
            }
            _ => None,
        };

        let (rule_id, outcome) = if let Some(existing) = existing {
            let id = existing.id;
            let mut active = existing.into_active_model();
            assign(&mut active.condition, rule.condition.clone());
            assign(&mut active.threshold, rule.threshold);
            assign(&mut active.severity, rule.severity.clone());
            assign(&mut active.enabled, rule.enabled);
            if active.is_changed() {
                active.updated_at = Set(now);
                active.update(db).await?;
                (id, StepOutcome::Updated)
            } else {
                (id, unchanged())
            }
        } else {
            let model = alert_rules::ActiveModel {
                name: Set(rule.name.clone()),
                condition: Set(rule.condition.clone()),
                threshold: Set(rule.threshold),
                severity: Set(rule.severity.clone()),
                enabled: Set(rule.enabled),
                created_at: Set(now),
                updated_at: Set(now),
                ..Default::default()
            }
            .insert(db)
            .await?;
            (model.id, StepOutcome::Created)
        };

        let channels = NotificationChannels::find()
            .filter(notification_channels::Column::Name.is_in(rule.channels.clone()))
            .all(db)
            .await?;

        let txn = db.begin().await?;
        AlertRuleChannels::delete_many()
            .filter(alert_rule_channels::Column::AlertRuleId.eq(rule_id))
            .exec(&txn)
            .await?;
        for channel in &channels {
            alert_rule_channels::ActiveModel {
                alert_rule_id: Set(rule_id),
                channel_id: Set(channel.id),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
        }
        txn.commit().await?;

        if channels.len() < rule.channels.len() {
            lwarn!(
                "system",
                LogStage::Import,
                LogComponent::Importer,
                "link_alert_channels",
                "部分通知渠道不存在，已忽略",
                rule = %rule.name,
                expected = rule.channels.len(),
                linked = channels.len()
            );
        }

        Ok(outcome)
    }
}

/// 解码失败的元素直接记为失败，其余返回
fn collect_decoded<T>(state: &mut ImportState, kind: EntityKind, items: Vec<Decoded<T>>) -> Vec<T> {
    items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| match item {
            Ok(value) => Some(value),
            Err(reason) => {
                state.record(kind, &format!("#{index}"), StepOutcome::Failed(reason));
                None
            }
        })
        .collect()
}

async fn placeholder_password_hash() -> Result<String> {
    let mut secret = [0u8; 24];
    rand::thread_rng().fill_bytes(&mut secret);
    let secret = hex::encode(secret);
    let hash = tokio::task::spawn_blocking(move || bcrypt::hash(secret, PLACEHOLDER_HASH_COST)).await??;
    Ok(hash)
}
