//! # vhost 发布
//!
//! `<available>/<domain>.conf` 保存渲染结果；活动域名在 `<enabled>` 下有指向它的符号链接。
//! 链接通过“临时链接 + rename”原子替换，不存在没有链接的窗口

use super::certs::CertificateStore;
use super::process::ProcessControl;
use super::render::{RenderInput, render_vhost};
use super::{NginxPaths, validate_domain_name};
use crate::error::{FleetError, Result};
use crate::snapshot::model::{DomainSnapshot, LoadBalancerSnapshot, UpstreamSnapshot};
use crate::{linfo, lwarn, logging::{LogComponent, LogStage}};
use entity::{Domains, LoadBalancerConfigs, SslCertificates, Upstreams, domains, load_balancer_configs, ssl_certificates, upstreams};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub struct ConfigFilePublisher {
    db: Arc<DatabaseConnection>,
    paths: NginxPaths,
    certs: CertificateStore,
    process: Arc<dyn ProcessControl>,
}

impl ConfigFilePublisher {
    pub fn new(db: Arc<DatabaseConnection>, paths: NginxPaths, process: Arc<dyn ProcessControl>) -> Self {
        let certs = CertificateStore::new(paths.certs_dir.clone());
        Self {
            db,
            paths,
            certs,
            process,
        }
    }

    #[must_use]
    pub const fn paths(&self) -> &NginxPaths {
        &self.paths
    }

    /// 从数据库读取域名并渲染
    pub async fn render(&self, domain_name: &str) -> Result<String> {
        let domain = self.load_domain(domain_name).await?;
        Ok(self.render_snapshot(&domain).await)
    }

    async fn render_snapshot(&self, domain: &DomainSnapshot) -> String {
        let certificate = if self.certs.exists(&domain.name).await
            && self.has_certificate_record(&domain.name).await
        {
            Some(self.certs.paths(&domain.name))
        } else {
            None
        };

        render_vhost(&RenderInput { domain, certificate })
    }

    async fn has_certificate_record(&self, domain_name: &str) -> bool {
        let Ok(Some(domain)) = Domains::find()
            .filter(domains::Column::Name.eq(domain_name))
            .one(self.db.as_ref())
            .await
        else {
            return false;
        };
        SslCertificates::find()
            .filter(ssl_certificates::Column::DomainId.eq(domain.id))
            .one(self.db.as_ref())
            .await
            .is_ok_and(|cert| cert.is_some())
    }

    /// 渲染并写入 vhost；活动域名启用，非活动域名移除启用链接
    pub async fn publish(&self, domain_name: &str) -> Result<PathBuf> {
        let domain = self.load_domain(domain_name).await?;
        let content = self.render_snapshot(&domain).await;
        self.write_vhost(&domain.name, &content, domain.status == "active")
            .await
    }

    /// 写入给定的 vhost 文本（恢复备份时使用原文件内容）
    pub async fn write_vhost(&self, domain_name: &str, content: &str, active: bool) -> Result<PathBuf> {
        validate_domain_name(domain_name)?;
        ensure_dir(&self.paths.sites_available).await?;
        ensure_dir(&self.paths.sites_enabled).await?;

        let available = self.paths.available_file(domain_name);
        tokio::fs::write(&available, content)
            .await
            .map_err(|e| FleetError::io(format!("写入 vhost 失败: {}", available.display()), e))?;

        let enabled = self.paths.enabled_link(domain_name);
        if active {
            swap_link(&available, &enabled).await?;
        } else {
            remove_if_exists(&enabled).await?;
        }

        linfo!(
            "system",
            LogStage::Publish,
            LogComponent::Publisher,
            "publish",
            "vhost 已发布",
            domain = %domain_name,
            enabled = active
        );

        Ok(available)
    }

    /// 发布全部域名，返回成功数量
    pub async fn publish_all(&self) -> Result<usize> {
        let names: Vec<String> = Domains::find()
            .order_by_asc(domains::Column::Name)
            .all(self.db.as_ref())
            .await?
            .into_iter()
            .map(|d| d.name)
            .collect();

        let mut published = 0;
        for name in &names {
            match self.publish(name).await {
                Ok(_) => published += 1,
                Err(e) => lwarn!(
                    "system",
                    LogStage::Publish,
                    LogComponent::Publisher,
                    "publish_all",
                    "vhost 发布失败",
                    domain = %name,
                    error = %e
                ),
            }
        }
        Ok(published)
    }

    /// 删除 vhost 文件与启用链接
    pub async fn unpublish(&self, domain_name: &str) -> Result<()> {
        validate_domain_name(domain_name)?;
        remove_if_exists(&self.paths.enabled_link(domain_name)).await?;
        remove_if_exists(&self.paths.available_file(domain_name)).await?;

        linfo!(
            "system",
            LogStage::Publish,
            LogComponent::Publisher,
            "unpublish",
            "vhost 已删除",
            domain = %domain_name
        );
        Ok(())
    }

    /// 校验配置后重载；失败时尝试备用方式。返回是否成功，从不返回错误
    pub async fn reload(&self) -> bool {
        if let Err(e) = self.process.test_config().await {
            lwarn!(
                "system",
                LogStage::Publish,
                LogComponent::Publisher,
                "test_config",
                "nginx 配置校验失败，跳过重载",
                error = %e
            );
            return false;
        }

        let Err(primary) = self.process.reload().await else {
            linfo!("system", LogStage::Publish, LogComponent::Publisher, "reload", "nginx 已重载");
            return true;
        };

        lwarn!(
            "system",
            LogStage::Publish,
            LogComponent::Publisher,
            "reload",
            "nginx 重载失败，尝试备用方式",
            error = %primary
        );

        match self.process.reload_alternate().await {
            Ok(()) => true,
            Err(e) => {
                lwarn!(
                    "system",
                    LogStage::Publish,
                    LogComponent::Publisher,
                    "reload_alternate",
                    "备用重载失败，需要手动重载",
                    error = %e
                );
                false
            }
        }
    }

    async fn load_domain(&self, domain_name: &str) -> Result<DomainSnapshot> {
        let db = self.db.as_ref();
        let domain = Domains::find()
            .filter(domains::Column::Name.eq(domain_name))
            .one(db)
            .await?
            .ok_or_else(|| FleetError::not_found("domain", domain_name))?;

        let upstreams = Upstreams::find()
            .filter(upstreams::Column::DomainId.eq(domain.id))
            .order_by_asc(upstreams::Column::Id)
            .all(db)
            .await?
            .into_iter()
            .map(|u| UpstreamSnapshot {
                host: u.host,
                port: u.port,
                protocol: u.protocol,
                weight: u.weight,
                max_fails: u.max_fails,
                fail_timeout: u.fail_timeout,
                ssl_verify: u.ssl_verify,
            })
            .collect();

        let load_balancer = LoadBalancerConfigs::find()
            .filter(load_balancer_configs::Column::DomainId.eq(domain.id))
            .one(db)
            .await?
            .map(|lb| LoadBalancerSnapshot {
                algorithm: lb.algorithm,
                health_check_enabled: lb.health_check_enabled,
                health_check_interval: lb.health_check_interval,
                health_check_timeout: lb.health_check_timeout,
                health_check_path: lb.health_check_path,
            });

        Ok(DomainSnapshot {
            name: domain.name,
            status: domain.status,
            ssl_enabled: domain.ssl_enabled,
            modsec_enabled: domain.modsec_enabled,
            upstreams,
            load_balancer,
        })
    }
}

async fn ensure_dir(dir: &Path) -> Result<()> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| FleetError::io(format!("创建目录失败: {}", dir.display()), e))
}

async fn remove_if_exists(path: &Path) -> Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(FleetError::io(format!("删除文件失败: {}", path.display()), e)),
    }
}

/// 在同目录创建临时链接后 rename 覆盖旧链接
async fn swap_link(target: &Path, link: &Path) -> Result<()> {
    let target = tokio::fs::canonicalize(target)
        .await
        .map_err(|e| FleetError::io(format!("无法解析路径: {}", target.display()), e))?;

    let file_name = link
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    let temp = link.with_file_name(format!(".{file_name}.{}.tmp", &suffix[..8]));

    create_link(&target, &temp).await?;
    if let Err(e) = tokio::fs::rename(&temp, link).await {
        let _ = tokio::fs::remove_file(&temp).await;
        return Err(FleetError::io(format!("替换启用链接失败: {}", link.display()), e));
    }
    Ok(())
}

#[cfg(unix)]
async fn create_link(target: &Path, link: &Path) -> Result<()> {
    tokio::fs::symlink(target, link)
        .await
        .map_err(|e| FleetError::io(format!("创建符号链接失败: {}", link.display()), e))
}

// 非 unix 平台退化为复制文件
#[cfg(not(unix))]
async fn create_link(target: &Path, link: &Path) -> Result<()> {
    tokio::fs::copy(target, link)
        .await
        .map(|_| ())
        .map_err(|e| FleetError::io(format!("复制 vhost 失败: {}", link.display()), e))
}
