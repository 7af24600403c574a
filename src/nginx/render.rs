//! # vhost 渲染
//!
//! 输出只取决于输入模型：上游池、80 端口块，以及启用 SSL 且证书存在时的 443 端口块

use super::certs::CertificatePaths;
use crate::snapshot::model::{DomainSnapshot, UpstreamSnapshot};

const SSL_PROTOCOLS: &str = "TLSv1.2 TLSv1.3";
const SSL_CIPHERS: &str = "ECDHE-ECDSA-AES128-GCM-SHA256:ECDHE-RSA-AES128-GCM-SHA256:\
ECDHE-ECDSA-AES256-GCM-SHA384:ECDHE-RSA-AES256-GCM-SHA384:\
ECDHE-ECDSA-CHACHA20-POLY1305:ECDHE-RSA-CHACHA20-POLY1305";
const MODSEC_RULES_FILE: &str = "/etc/nginx/modsec/main.conf";

/// 渲染输入
#[derive(Debug, Clone)]
pub struct RenderInput<'a> {
    pub domain: &'a DomainSnapshot,
    /// 证书存在时的文件路径
    pub certificate: Option<CertificatePaths>,
}

impl RenderInput<'_> {
    /// 只有启用 SSL 且证书存在时才输出 HTTPS 块
    #[must_use]
    pub const fn serves_https(&self) -> bool {
        self.domain.ssl_enabled && self.certificate.is_some()
    }
}

/// 上游池名称
///
/// `_`、`.`、`-` 分别编码为 `_u`、`_d`、`_h`，不同域名得到不同名称
#[must_use]
pub fn upstream_name(domain: &str) -> String {
    let mut name = String::with_capacity(domain.len() + 16);
    for c in domain.chars() {
        match c {
            '_' => name.push_str("_u"),
            '.' => name.push_str("_d"),
            '-' => name.push_str("_h"),
            other => name.push(other),
        }
    }
    name.push_str("_backend");
    name
}

/// 渲染完整 vhost 文本
#[must_use]
pub fn render_vhost(input: &RenderInput<'_>) -> String {
    let domain = input.domain;
    let mut lines = vec![
        format!("# Managed by proxy-fleet for {}", domain.name),
        String::new(),
    ];

    if !domain.upstreams.is_empty() {
        lines.extend(upstream_block(domain));
        lines.push(String::new());
    }

    lines.extend(http_block(input));

    if let Some(paths) = input.certificate.as_ref().filter(|_| input.serves_https()) {
        lines.push(String::new());
        lines.extend(https_block(domain, paths));
    }

    let mut text = lines.join("\n");
    text.push('\n');
    text
}

fn upstream_block(domain: &DomainSnapshot) -> Vec<String> {
    let mut lines = vec![format!("upstream {} {{", upstream_name(&domain.name))];

    let algorithm = domain
        .load_balancer
        .as_ref()
        .map_or("round_robin", |lb| lb.algorithm.as_str());
    match algorithm {
        "least_conn" => lines.push("    least_conn;".to_string()),
        "ip_hash" => lines.push("    ip_hash;".to_string()),
        "hash" => lines.push("    hash $request_uri consistent;".to_string()),
        _ => {}
    }

    for upstream in &domain.upstreams {
        lines.push(format!(
            "    server {}:{} weight={} max_fails={} fail_timeout={}s;",
            upstream.host, upstream.port, upstream.weight, upstream.max_fails, upstream.fail_timeout
        ));
    }

    lines.push("    keepalive 32;".to_string());
    lines.push("}".to_string());
    lines
}

fn http_block(input: &RenderInput<'_>) -> Vec<String> {
    let domain = input.domain;
    let mut lines = vec![
        "server {".to_string(),
        "    listen 80;".to_string(),
        "    listen [::]:80;".to_string(),
        format!("    server_name {};", domain.name),
        String::new(),
        "    location /.well-known/acme-challenge/ {".to_string(),
        "        root /var/www/html;".to_string(),
        "    }".to_string(),
        String::new(),
    ];

    if input.serves_https() {
        lines.push("    location / {".to_string());
        lines.push("        return 301 https://$host$request_uri;".to_string());
        lines.push("    }".to_string());
    } else {
        lines.extend(modsecurity_directives(domain));
        lines.extend(proxy_locations(domain));
    }

    lines.push("}".to_string());
    lines
}

fn https_block(domain: &DomainSnapshot, paths: &CertificatePaths) -> Vec<String> {
    let mut lines = vec![
        "server {".to_string(),
        "    listen 443 ssl;".to_string(),
        "    listen [::]:443 ssl;".to_string(),
        "    http2 on;".to_string(),
        format!("    server_name {};", domain.name),
        String::new(),
        format!("    ssl_certificate {};", paths.certificate.display()),
        format!("    ssl_certificate_key {};", paths.private_key.display()),
        format!("    ssl_protocols {SSL_PROTOCOLS};"),
        format!("    ssl_ciphers {SSL_CIPHERS};"),
        "    ssl_prefer_server_ciphers off;".to_string(),
        "    ssl_session_cache shared:SSL:10m;".to_string(),
        "    ssl_session_timeout 10m;".to_string(),
        "    ssl_session_tickets off;".to_string(),
        String::new(),
        "    add_header Strict-Transport-Security \"max-age=31536000; includeSubDomains\" always;"
            .to_string(),
        "    add_header X-Frame-Options \"SAMEORIGIN\" always;".to_string(),
        "    add_header X-Content-Type-Options \"nosniff\" always;".to_string(),
        "    add_header X-XSS-Protection \"1; mode=block\" always;".to_string(),
        "    add_header Referrer-Policy \"strict-origin-when-cross-origin\" always;".to_string(),
        String::new(),
    ];

    lines.extend(modsecurity_directives(domain));
    lines.extend(proxy_locations(domain));
    lines.push("}".to_string());
    lines
}

fn modsecurity_directives(domain: &DomainSnapshot) -> Vec<String> {
    if !domain.modsec_enabled {
        return Vec::new();
    }
    vec![
        "    modsecurity on;".to_string(),
        format!("    modsecurity_rules_file {MODSEC_RULES_FILE};"),
        String::new(),
    ]
}

fn upstream_scheme(upstreams: &[UpstreamSnapshot]) -> &'static str {
    if upstreams.iter().any(|u| u.protocol == "https") {
        "https"
    } else {
        "http"
    }
}

fn proxy_locations(domain: &DomainSnapshot) -> Vec<String> {
    let mut lines = vec!["    location / {".to_string()];

    if domain.upstreams.is_empty() {
        lines.push("        return 503;".to_string());
    } else {
        let scheme = upstream_scheme(&domain.upstreams);
        lines.push(format!(
            "        proxy_pass {scheme}://{};",
            upstream_name(&domain.name)
        ));
        if scheme == "https" {
            let verify = domain.upstreams.iter().any(|u| u.ssl_verify);
            lines.push(format!(
                "        proxy_ssl_verify {};",
                if verify { "on" } else { "off" }
            ));
            lines.push("        proxy_ssl_server_name on;".to_string());
        }
        lines.extend(
            [
                "        proxy_http_version 1.1;",
                "        proxy_set_header Host $host;",
                "        proxy_set_header X-Real-IP $remote_addr;",
                "        proxy_set_header X-Forwarded-For $proxy_add_x_forwarded_for;",
                "        proxy_set_header X-Forwarded-Proto $scheme;",
                "        proxy_set_header Upgrade $http_upgrade;",
                "        proxy_set_header Connection \"upgrade\";",
                "        proxy_next_upstream error timeout http_502 http_503 http_504;",
                "        proxy_next_upstream_tries 3;",
                "        proxy_next_upstream_timeout 10s;",
            ]
            .map(str::to_string),
        );

        let (connect, read) = domain
            .load_balancer
            .as_ref()
            .filter(|lb| lb.health_check_enabled)
            .map_or((5, 60), |lb| (lb.health_check_timeout, lb.health_check_interval.max(60)));
        lines.push(format!("        proxy_connect_timeout {connect}s;"));
        lines.push(format!("        proxy_send_timeout {read}s;"));
        lines.push(format!("        proxy_read_timeout {read}s;"));
    }

    lines.push("    }".to_string());
    lines.push(String::new());
    lines.push("    location = /nginx-health {".to_string());
    lines.push("        access_log off;".to_string());
    lines.push("        return 200 \"healthy\\n\";".to_string());
    lines.push("    }".to_string());
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::model::LoadBalancerSnapshot;
    use std::path::PathBuf;

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

    fn domain(ssl_enabled: bool) -> DomainSnapshot {
        DomainSnapshot {
            name: "example.com".to_string(),
            status: "active".to_string(),
            ssl_enabled,
            modsec_enabled: false,
            upstreams: vec![upstream("10.0.0.1", 8080), upstream("10.0.0.2", 8080)],
            load_balancer: None,
        }
    }

    fn cert_paths() -> CertificatePaths {
        CertificatePaths {
            certificate: PathBuf::from("/etc/nginx/ssl/example.com.crt"),
            private_key: PathBuf::from("/etc/nginx/ssl/example.com.key"),
            chain: PathBuf::from("/etc/nginx/ssl/example.com.chain.crt"),
        }
    }

    #[test]
    fn test_plain_domain_renders_single_http_block() {
        let domain = domain(false);
        let text = render_vhost(&RenderInput {
            domain: &domain,
            certificate: None,
        });

        assert_eq!(text.matches("listen 80;").count(), 1);
        assert_eq!(text.matches("listen 443").count(), 0);
        assert!(text.contains("server 10.0.0.1:8080 weight=1 max_fails=3 fail_timeout=30s;"));
        assert!(text.contains("server 10.0.0.2:8080 weight=1 max_fails=3 fail_timeout=30s;"));
        assert!(text.contains("proxy_pass http://example_dcom_backend;"));
        assert!(text.contains("proxy_set_header Upgrade $http_upgrade;"));
        assert!(!text.contains("return 301"));
    }

    #[test]
    fn test_ssl_with_certificate_adds_https_and_redirect() {
        let domain = domain(true);
        let text = render_vhost(&RenderInput {
            domain: &domain,
            certificate: Some(cert_paths()),
        });

        assert_eq!(text.matches("listen 80;").count(), 1);
        assert_eq!(text.matches("listen 443 ssl;").count(), 1);
        assert!(text.contains("return 301 https://$host$request_uri;"));
        assert!(text.contains("ssl_protocols TLSv1.2 TLSv1.3;"));
        assert!(text.contains("Strict-Transport-Security"));
    }

    #[test]
    fn test_ssl_without_certificate_keeps_proxying() {
        let domain = domain(true);
        let text = render_vhost(&RenderInput {
            domain: &domain,
            certificate: None,
        });

        assert_eq!(text.matches("listen 443").count(), 0);
        assert!(!text.contains("return 301"));
        assert!(text.contains("proxy_pass http://example_dcom_backend;"));
    }

    #[test]
    fn test_algorithm_directives() {
        for (algorithm, directive) in [
            ("least_conn", Some("least_conn;")),
            ("ip_hash", Some("ip_hash;")),
            ("hash", Some("hash $request_uri consistent;")),
            ("round_robin", None),
        ] {
            let mut domain = domain(false);
            domain.load_balancer = Some(LoadBalancerSnapshot {
                algorithm: algorithm.to_string(),
                health_check_enabled: false,
                health_check_interval: 30,
                health_check_timeout: 5,
                health_check_path: "/health".to_string(),
            });
            let text = render_vhost(&RenderInput {
                domain: &domain,
                certificate: None,
            });
            match directive {
                Some(d) => assert!(text.contains(d), "{algorithm}"),
                None => {
                    assert!(!text.contains("least_conn;"));
                    assert!(!text.contains("ip_hash;"));
                }
            }
        }
    }

    #[test]
    fn test_render_is_deterministic() {
        let domain = domain(true);
        let input = RenderInput {
            domain: &domain,
            certificate: Some(cert_paths()),
        };
        assert_eq!(render_vhost(&input), render_vhost(&input));
    }

    #[test]
    fn test_upstream_names_are_distinct() {
        assert_eq!(upstream_name("example.com"), "example_dcom_backend");
        assert_ne!(upstream_name("my-site.com"), upstream_name("my.site.com"));
        assert_ne!(upstream_name("a-b.com"), upstream_name("a_b.com"));
        assert_ne!(upstream_name("a_d.com"), upstream_name("a.com"));
    }
}
