//! # 配置管理模块
//!
//! 处理应用配置加载与验证

mod app_config;
mod database;

pub use app_config::{
    AppConfig, BackupConfig, ManagementConfig, NginxConfig, NodeConfig, NodeRole, OperatorToken,
    ServerConfig,
};
pub use database::DatabaseConfig;

use crate::error::{FleetError, Result};
use crate::{linfo, logging::{LogComponent, LogStage}};
use std::env;
use std::path::{Path, PathBuf};

/// 默认配置文件路径：`config/config.{RUST_ENV}.toml`
pub fn default_config_path() -> PathBuf {
    let env = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
    PathBuf::from(format!("config/config.{env}.toml"))
}

/// 加载配置文件
pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let config_file = path.map_or_else(default_config_path, Path::to_path_buf);

    if !config_file.exists() {
        return Err(FleetError::config(format!(
            "配置文件不存在: {}",
            config_file.display()
        )));
    }

    let content = std::fs::read_to_string(&config_file).map_err(|e| {
        FleetError::config_with_source(format!("读取配置文件失败: {}", config_file.display()), e)
    })?;

    let config = parse_config(&content)?;

    linfo!(
        "system",
        LogStage::Startup,
        LogComponent::Config,
        "load_config",
        &format!("配置加载完成: {}", config_file.display())
    );

    Ok(config)
}

/// 解析并验证配置文本
pub fn parse_config(content: &str) -> Result<AppConfig> {
    let config: AppConfig = toml::from_str(content)?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[server]
host = "127.0.0.1"
port = 9090

[database]
url = "sqlite::memory:"
"#;

    #[test]
    fn test_parse_minimal_config_uses_defaults() {
        let config = parse_config(MINIMAL).unwrap();
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.node.role, NodeRole::Master);
        assert_eq!(config.backup.tick_interval_secs, 60);
        assert_eq!(config.node.health_check_interval_secs, 60);
        assert_eq!(config.node.offline_threshold_secs, 300);
        assert!(config.management.tokens.is_empty());
    }

    #[test]
    fn test_slave_without_master_url_rejected() {
        let content = format!("{MINIMAL}\n[node]\nrole = \"slave\"\n");
        let err = parse_config(&content).unwrap_err();
        assert!(matches!(err, FleetError::Config { .. }));
    }

    #[test]
    fn test_bundled_configs_are_valid() {
        let master = parse_config(include_str!("../../config/config.dev.toml")).unwrap();
        assert!(!master.is_slave());
        assert_eq!(master.management.tokens.len(), 2);

        let slave = parse_config(include_str!("../../config/config.slave.toml")).unwrap();
        assert!(slave.is_slave());
        assert!(!slave.backup.scheduler_enabled);
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_config(Some(Path::new("/nonexistent/fleet.toml"))).unwrap_err();
        assert!(err.to_string().contains("配置文件不存在"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, MINIMAL).unwrap();
        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.database.url, "sqlite::memory:");
    }
}
