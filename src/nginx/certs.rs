//! # 证书文件存储
//!
//! 证书按域名保存为 `<domain>.crt`、`<domain>.key`、`<domain>.chain.crt`，私钥仅所有者可读。
//! 文件先写入同目录的临时文件再 rename 覆盖，私钥的临时文件在创建时即为 0600

use super::validate_domain_name;
use crate::error::{FleetError, Result};
use crate::snapshot::model::CertificateFiles;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

const CERTIFICATE_MODE: u32 = 0o644;
const PRIVATE_KEY_MODE: u32 = 0o600;

/// 单个域名的证书文件路径
#[derive(Debug, Clone)]
pub struct CertificatePaths {
    pub certificate: PathBuf,
    pub private_key: PathBuf,
    pub chain: PathBuf,
}

#[derive(Debug, Clone)]
pub struct CertificateStore {
    dir: PathBuf,
}

impl CertificateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub fn paths(&self, domain: &str) -> CertificatePaths {
        CertificatePaths {
            certificate: self.dir.join(format!("{domain}.crt")),
            private_key: self.dir.join(format!("{domain}.key")),
            chain: self.dir.join(format!("{domain}.chain.crt")),
        }
    }

    /// 写入证书文件；链为空时删除旧的链文件
    pub async fn write(
        &self,
        domain: &str,
        certificate: &str,
        private_key: &str,
        chain: Option<&str>,
    ) -> Result<()> {
        validate_domain_name(domain)?;
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| FleetError::io(format!("创建证书目录失败: {}", self.dir.display()), e))?;

        let paths = self.paths(domain);
        write_file(&paths.certificate, certificate, CERTIFICATE_MODE).await?;
        write_file(&paths.private_key, private_key, PRIVATE_KEY_MODE).await?;

        match chain {
            Some(chain) if !chain.is_empty() => write_file(&paths.chain, chain, CERTIFICATE_MODE).await?,
            _ => remove_if_exists(&paths.chain).await?,
        }

        Ok(())
    }

    /// 读取证书文件；证书或私钥缺失为错误，链缺失记为 `None`
    pub async fn read(&self, domain: &str) -> Result<CertificateFiles> {
        let paths = self.paths(domain);
        let certificate = read_file(&paths.certificate).await?;
        let private_key = read_file(&paths.private_key).await?;
        let chain = match tokio::fs::read_to_string(&paths.chain).await {
            Ok(content) => Some(content),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => {
                return Err(FleetError::io(
                    format!("读取证书链失败: {}", paths.chain.display()),
                    e,
                ));
            }
        };

        Ok(CertificateFiles {
            certificate,
            private_key,
            chain,
        })
    }

    /// 证书与私钥是否都在磁盘上
    pub async fn exists(&self, domain: &str) -> bool {
        let paths = self.paths(domain);
        tokio::fs::try_exists(&paths.certificate).await.unwrap_or(false)
            && tokio::fs::try_exists(&paths.private_key).await.unwrap_or(false)
    }

    pub async fn remove(&self, domain: &str) -> Result<()> {
        validate_domain_name(domain)?;
        let paths = self.paths(domain);
        remove_if_exists(&paths.certificate).await?;
        remove_if_exists(&paths.private_key).await?;
        remove_if_exists(&paths.chain).await
    }
}

/// 写入临时文件后 rename 覆盖目标
async fn write_file(path: &Path, content: &str, mode: u32) -> Result<()> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    let temp = path.with_file_name(format!(".{file_name}.{}.tmp", &suffix[..8]));

    let written = match write_new(&temp, content, mode).await {
        Ok(()) => tokio::fs::rename(&temp, path).await,
        Err(e) => Err(e),
    };
    if let Err(e) = written {
        let _ = tokio::fs::remove_file(&temp).await;
        return Err(FleetError::io(format!("写入文件失败: {}", path.display()), e));
    }
    Ok(())
}

#[cfg_attr(not(unix), allow(unused_variables))]
async fn write_new(path: &Path, content: &str, mode: u32) -> std::io::Result<()> {
    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(mode);

    let mut file = options.open(path).await?;
    file.write_all(content.as_bytes()).await?;
    file.sync_all().await
}

async fn read_file(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| FleetError::io(format!("读取文件失败: {}", path.display()), e))
}

async fn remove_if_exists(path: &Path) -> Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(FleetError::io(format!("删除文件失败: {}", path.display()), e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_and_read_certificate() {
        let dir = tempfile::tempdir().unwrap();
        let store = CertificateStore::new(dir.path().join("ssl"));

        store
            .write("example.com", "CERT", "KEY", Some("CHAIN"))
            .await
            .unwrap();

        let files = store.read("example.com").await.unwrap();
        assert_eq!(files.certificate, "CERT");
        assert_eq!(files.private_key, "KEY");
        assert_eq!(files.chain.as_deref(), Some("CHAIN"));
        assert!(store.exists("example.com").await);
    }

    #[tokio::test]
    async fn test_missing_chain_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = CertificateStore::new(dir.path());
        store.write("example.com", "CERT", "KEY", Some("OLD")).await.unwrap();
        store.write("example.com", "CERT", "KEY", None).await.unwrap();

        let files = store.read("example.com").await.unwrap();
        assert!(files.chain.is_none());
    }

    #[tokio::test]
    async fn test_missing_key_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = CertificateStore::new(dir.path());
        std::fs::write(dir.path().join("example.com.crt"), "CERT").unwrap();

        assert!(store.read("example.com").await.is_err());
        assert!(!store.exists("example.com").await);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_private_key_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = CertificateStore::new(dir.path());
        store.write("example.com", "CERT", "KEY", None).await.unwrap();

        let mode = std::fs::metadata(store.paths("example.com").private_key)
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_rewrite_replaces_readable_key_without_leftovers() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = CertificateStore::new(dir.path());
        let key_path = store.paths("example.com").private_key;
        std::fs::write(&key_path, "OLD").unwrap();
        std::fs::set_permissions(&key_path, std::fs::Permissions::from_mode(0o644)).unwrap();

        store.write("example.com", "CERT", "NEW", None).await.unwrap();

        assert_eq!(std::fs::read_to_string(&key_path).unwrap(), "NEW");
        let mode = std::fs::metadata(&key_path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_rejects_domain_outside_certs_dir() {
        let root = tempfile::tempdir().unwrap();
        let store = CertificateStore::new(root.path().join("a").join("ssl"));

        let err = store
            .write("../../escaped", "CERT", "KEY", None)
            .await
            .unwrap_err();
        assert!(matches!(err, FleetError::Validation { .. }));
        assert!(!root.path().join("escaped.crt").exists());
        assert!(!root.path().join("a").join("ssl").exists());
    }
}
