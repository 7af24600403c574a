//! # nginx 配置发布
//!
//! 从域名模型渲染 vhost 文件、管理 available/enabled 目录与证书文件，并重载 nginx

pub mod certs;
pub mod process;
pub mod publisher;
pub mod render;

pub use certs::CertificateStore;
pub use process::{NginxProcess, ProcessControl};
pub use publisher::ConfigFilePublisher;
pub use render::{RenderInput, render_vhost};

use crate::config::NginxConfig;
use crate::error::{FleetError, Result};
use std::path::{Path, PathBuf};

const MAX_DOMAIN_LENGTH: usize = 253;
const MAX_LABEL_LENGTH: usize = 63;

/// 域名会成为文件名与 `server_name` 的一部分：只允许字母、数字、连字符与点，
/// 标签非空且不以连字符开头或结尾
pub fn validate_domain_name(name: &str) -> Result<()> {
    let invalid = |reason: &str| FleetError::validation(format!("非法域名 {name:?}: {reason}"));

    if name.is_empty() || name.len() > MAX_DOMAIN_LENGTH {
        return Err(invalid("长度必须在 1 到 253 之间"));
    }
    if let Some(c) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '.'))
    {
        return Err(invalid(&format!("包含字符 {c:?}")));
    }
    for label in name.split('.') {
        if label.is_empty() {
            return Err(invalid("包含空标签"));
        }
        if label.len() > MAX_LABEL_LENGTH {
            return Err(invalid("标签超过 63 个字符"));
        }
        if label.starts_with('-') || label.ends_with('-') {
            return Err(invalid("标签不能以连字符开头或结尾"));
        }
    }
    Ok(())
}

/// vhost 与证书的磁盘布局
#[derive(Debug, Clone)]
pub struct NginxPaths {
    pub sites_available: PathBuf,
    pub sites_enabled: PathBuf,
    pub certs_dir: PathBuf,
}

impl NginxPaths {
    #[must_use]
    pub fn from_config(config: &NginxConfig) -> Self {
        Self {
            sites_available: config.sites_available.clone(),
            sites_enabled: config.sites_enabled.clone(),
            certs_dir: config.certs_dir.clone(),
        }
    }

    /// 以同一根目录下的三个子目录构造布局
    #[must_use]
    pub fn under(root: &Path) -> Self {
        Self {
            sites_available: root.join("sites-available"),
            sites_enabled: root.join("sites-enabled"),
            certs_dir: root.join("ssl"),
        }
    }

    #[must_use]
    pub fn available_file(&self, domain: &str) -> PathBuf {
        self.sites_available.join(format!("{domain}.conf"))
    }

    #[must_use]
    pub fn enabled_link(&self, domain: &str) -> PathBuf {
        self.sites_enabled.join(format!("{domain}.conf"))
    }
}
