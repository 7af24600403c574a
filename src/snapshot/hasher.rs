//! # 快照摘要
//!
//! 摘要只取决于实体内容：序列化前必须先按自然键排序所有与顺序无关的集合，
//! 否则两个内容相同的库可能因查询顺序不同而得到不同的摘要

use super::model::SyncConfig;
use crate::error::Result;
use sha2::{Digest, Sha256};
use std::cmp::Ordering;

/// 排序所有集合：先比较自然键，自然键相同时比较完整内容，保证全序。
/// 嵌套集合先于外层排序，外层比较时看到的已是规范形式
pub fn canonicalize(config: &mut SyncConfig) {
    for domain in &mut config.domains {
        domain
            .upstreams
            .sort_by(|a, b| by_key(a, b, |u| (&u.host, u.port, &u.protocol)));
    }
    config.domains.sort_by(|a, b| by_key(a, b, |d| &d.name));

    for cert in &mut config.ssl_certificates {
        cert.sans.sort();
    }
    config
        .ssl_certificates
        .sort_by(|a, b| by_key(a, b, |c| &c.domain_name));

    config
        .modsec_crs_rules
        .sort_by(|a, b| by_key(a, b, |r| (&r.domain_name, &r.rule_file)));

    config
        .modsec_custom_rules
        .sort_by(|a, b| by_key(a, b, |r| (&r.domain_name, &r.name, &r.rule_content)));

    config.acl_rules.sort_by(|a, b| {
        by_key(a, b, |r| {
            (
                &r.name,
                &r.rule_type,
                &r.condition.field,
                &r.condition.operator,
                &r.condition.value,
                &r.action,
            )
        })
    });

    config.users.sort_by(|a, b| by_key(a, b, |u| &u.username));
    config.nginx_configs.sort_by(|a, b| by_key(a, b, |c| &c.name));

    for nlb in &mut config.network_load_balancers {
        nlb.upstreams.sort_by(|a, b| by_key(a, b, |u| (&u.host, u.port)));
    }
    config
        .network_load_balancers
        .sort_by(|a, b| by_key(a, b, |n| &n.name));
}

fn by_key<'a, T, K>(a: &'a T, b: &'a T, key: impl Fn(&'a T) -> K) -> Ordering
where
    T: Ord,
    K: Ord,
{
    key(a).cmp(&key(b)).then_with(|| a.cmp(b))
}

/// 计算快照摘要（小写十六进制 SHA-256）
pub fn digest(config: &SyncConfig) -> Result<String> {
    let mut canonical = config.clone();
    canonicalize(&mut canonical);
    let bytes = serde_json::to_vec(&canonical)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::model::{
        AclCondition, AclRuleSnapshot, DomainSnapshot, UpstreamSnapshot,
    };
    use pretty_assertions::assert_eq;

    fn upstream(host: &str, port: i32) -> UpstreamSnapshot {
        UpstreamSnapshot {
            host: host.to_string(),
            port,
            protocol: "http".to_string(),
            weight: 1,
            max_fails: 3,
            fail_timeout: 30,
            ssl_verify: false,
        }
    }

    fn domain(name: &str, upstreams: Vec<UpstreamSnapshot>) -> DomainSnapshot {
        DomainSnapshot {
            name: name.to_string(),
            status: "active".to_string(),
            ssl_enabled: false,
            modsec_enabled: false,
            upstreams,
            load_balancer: None,
        }
    }

    fn acl(name: &str, value: &str) -> AclRuleSnapshot {
        AclRuleSnapshot {
            name: name.to_string(),
            rule_type: "blacklist".to_string(),
            condition: AclCondition {
                field: "ip".to_string(),
                operator: "equals".to_string(),
                value: value.to_string(),
            },
            action: "deny".to_string(),
            enabled: true,
        }
    }

    #[test]
    fn test_digest_ignores_collection_order() {
        let first = SyncConfig {
            domains: vec![
                domain("b.example.com", vec![upstream("10.0.0.2", 80), upstream("10.0.0.1", 80)]),
                domain("a.example.com", vec![upstream("10.0.0.3", 8080)]),
            ],
            acl_rules: vec![acl("block", "1.1.1.1"), acl("block", "0.0.0.0")],
            ..SyncConfig::default()
        };
        let second = SyncConfig {
            domains: vec![
                domain("a.example.com", vec![upstream("10.0.0.3", 8080)]),
                domain("b.example.com", vec![upstream("10.0.0.1", 80), upstream("10.0.0.2", 80)]),
            ],
            acl_rules: vec![acl("block", "0.0.0.0"), acl("block", "1.1.1.1")],
            ..SyncConfig::default()
        };

        assert_eq!(digest(&first).unwrap(), digest(&second).unwrap());
    }

    #[test]
    fn test_digest_changes_with_content() {
        let base = SyncConfig {
            domains: vec![domain("a.example.com", vec![upstream("10.0.0.1", 80)])],
            ..SyncConfig::default()
        };
        let mut changed = base.clone();
        changed.domains[0].upstreams[0].weight = 5;

        assert_ne!(digest(&base).unwrap(), digest(&changed).unwrap());
    }

    #[test]
    fn test_digest_is_lowercase_hex_sha256() {
        let hash = digest(&SyncConfig::default()).unwrap();
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn test_digest_ignores_order_of_records_sharing_a_key() {
        let mut disabled = acl("block", "1.1.1.1");
        disabled.enabled = false;
        let enabled = acl("block", "1.1.1.1");

        let mut light = upstream("10.0.0.1", 80);
        light.weight = 1;
        let mut heavy = upstream("10.0.0.1", 80);
        heavy.weight = 5;

        let first = SyncConfig {
            domains: vec![domain("a.example.com", vec![light.clone(), heavy.clone()])],
            acl_rules: vec![disabled.clone(), enabled.clone()],
            ..SyncConfig::default()
        };
        let second = SyncConfig {
            domains: vec![domain("a.example.com", vec![heavy, light])],
            acl_rules: vec![enabled, disabled],
            ..SyncConfig::default()
        };

        assert_eq!(digest(&first).unwrap(), digest(&second).unwrap());
    }

    #[test]
    fn test_domains_sharing_a_name_compare_canonical_children() {
        let a = domain("dup.example.com", vec![upstream("10.0.0.2", 80), upstream("10.0.0.1", 80)]);
        let b = domain("dup.example.com", vec![upstream("10.0.0.3", 80)]);

        let first = SyncConfig {
            domains: vec![a.clone(), b.clone()],
            ..SyncConfig::default()
        };
        let second = SyncConfig {
            domains: vec![b, a],
            ..SyncConfig::default()
        };

        assert_eq!(digest(&first).unwrap(), digest(&second).unwrap());
    }

    #[test]
    fn test_canonicalize_sorts_nested_collections() {
        let mut config = SyncConfig {
            domains: vec![domain("z.example.com", vec![upstream("b", 2), upstream("a", 9), upstream("a", 1)])],
            ..SyncConfig::default()
        };
        canonicalize(&mut config);
        let order: Vec<(String, i32)> = config.domains[0]
            .upstreams
            .iter()
            .map(|u| (u.host.clone(), u.port))
            .collect();
        assert_eq!(
            order,
            vec![("a".to_string(), 1), ("a".to_string(), 9), ("b".to_string(), 2)]
        );
    }
}
