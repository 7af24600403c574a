//! # 导入策略表
//!
//! 每类实体采用三种策略之一：`Upsert` 按自然键匹配后更新，
//! `CreateOnly` 总是新建，`ReplaceChildren` 先删除父实体下的子行再重建。
//! 导入器按表的顺序逐项执行，未列入表中的实体不会被导入

use serde::Serialize;
use std::fmt;

/// 可导入的实体类型，声明顺序即导入顺序
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum EntityKind {
    Domain,
    Upstream,
    LoadBalancer,
    SslCertificate,
    CrsRule,
    CustomRule,
    AclRule,
    User,
    NginxConfig,
    NetworkLoadBalancer,
    NlbUpstream,
    NotificationChannel,
    AlertRule,
}

impl EntityKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Domain => "domain",
            Self::Upstream => "upstream",
            Self::LoadBalancer => "load_balancer",
            Self::SslCertificate => "ssl_certificate",
            Self::CrsRule => "crs_rule",
            Self::CustomRule => "custom_rule",
            Self::AclRule => "acl_rule",
            Self::User => "user",
            Self::NginxConfig => "nginx_config",
            Self::NetworkLoadBalancer => "network_load_balancer",
            Self::NlbUpstream => "nlb_upstream",
            Self::NotificationChannel => "notification_channel",
            Self::AlertRule => "alert_rule",
        }
    }

    /// 该实体的导入策略
    #[must_use]
    pub fn policy(self) -> &'static EntityPolicy {
        IMPORT_POLICIES
            .iter()
            .find(|entry| entry.kind == self)
            .unwrap_or(&IMPORT_POLICIES[0])
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ImportPolicy {
    Upsert,
    /// 不做匹配，重复导入会产生重复行
    CreateOnly,
    /// 删除父实体下的全部子行后重建
    ReplaceChildren,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityPolicy {
    pub kind: EntityKind,
    /// 仅 `Upsert` 使用
    pub natural_key: &'static [&'static str],
    pub policy: ImportPolicy,
    /// 仅备份恢复时导入
    pub backup_only: bool,
}

pub static IMPORT_POLICIES: [EntityPolicy; 13] = [
    EntityPolicy {
        kind: EntityKind::Domain,
        natural_key: &["name"],
        policy: ImportPolicy::Upsert,
        backup_only: false,
    },
    EntityPolicy {
        kind: EntityKind::Upstream,
        natural_key: &["domain"],
        policy: ImportPolicy::ReplaceChildren,
        backup_only: false,
    },
    EntityPolicy {
        kind: EntityKind::LoadBalancer,
        natural_key: &["domain"],
        policy: ImportPolicy::Upsert,
        backup_only: false,
    },
    EntityPolicy {
        kind: EntityKind::SslCertificate,
        natural_key: &["domain"],
        policy: ImportPolicy::Upsert,
        backup_only: false,
    },
    EntityPolicy {
        kind: EntityKind::CrsRule,
        natural_key: &["rule_file", "domain"],
        policy: ImportPolicy::Upsert,
        backup_only: false,
    },
    EntityPolicy {
        kind: EntityKind::CustomRule,
        natural_key: &["name", "domain"],
        policy: ImportPolicy::CreateOnly,
        backup_only: false,
    },
    EntityPolicy {
        kind: EntityKind::AclRule,
        natural_key: &["name", "type", "field", "operator", "value"],
        policy: ImportPolicy::CreateOnly,
        backup_only: false,
    },
    EntityPolicy {
        kind: EntityKind::User,
        natural_key: &["username"],
        policy: ImportPolicy::Upsert,
        backup_only: false,
    },
    EntityPolicy {
        kind: EntityKind::NginxConfig,
        natural_key: &["name"],
        policy: ImportPolicy::Upsert,
        backup_only: false,
    },
    EntityPolicy {
        kind: EntityKind::NetworkLoadBalancer,
        natural_key: &["name"],
        policy: ImportPolicy::Upsert,
        backup_only: false,
    },
    EntityPolicy {
        kind: EntityKind::NlbUpstream,
        natural_key: &["network_load_balancer"],
        policy: ImportPolicy::ReplaceChildren,
        backup_only: false,
    },
    EntityPolicy {
        kind: EntityKind::NotificationChannel,
        natural_key: &["name"],
        policy: ImportPolicy::Upsert,
        backup_only: true,
    },
    EntityPolicy {
        kind: EntityKind::AlertRule,
        natural_key: &["name"],
        policy: ImportPolicy::Upsert,
        backup_only: true,
    },
];
