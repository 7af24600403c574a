//! # 应用配置结构定义

use crate::config_error;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// 应用主配置结构
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// 管理接口监听配置
    #[serde(default)]
    pub server: ServerConfig,
    /// 数据库配置
    #[serde(default)]
    pub database: super::DatabaseConfig,
    /// nginx 文件布局与进程控制
    #[serde(default)]
    pub nginx: NginxConfig,
    /// 备份配置
    #[serde(default)]
    pub backup: BackupConfig,
    /// 节点角色与同步配置
    #[serde(default)]
    pub node: NodeConfig,
    /// 管理接口认证配置
    #[serde(default)]
    pub management: ManagementConfig,
}

/// 管理接口监听配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// 监听地址
    pub host: String,
    /// 监听端口
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
        }
    }
}

/// nginx 配置文件布局
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NginxConfig {
    /// vhost 文件目录
    pub sites_available: PathBuf,
    /// 已启用 vhost 的符号链接目录
    pub sites_enabled: PathBuf,
    /// 证书目录
    pub certs_dir: PathBuf,
    /// nginx 可执行文件
    pub binary: String,
    /// 主重载方式失败后的备用命令
    pub alternate_reload: Vec<String>,
}

impl Default for NginxConfig {
    fn default() -> Self {
        Self {
            sites_available: PathBuf::from("/etc/nginx/sites-available"),
            sites_enabled: PathBuf::from("/etc/nginx/sites-enabled"),
            certs_dir: PathBuf::from("/etc/nginx/ssl"),
            binary: "nginx".to_string(),
            alternate_reload: vec![
                "systemctl".to_string(),
                "reload".to_string(),
                "nginx".to_string(),
            ],
        }
    }
}

/// 备份配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupConfig {
    /// 备份文件目录
    pub directory: PathBuf,
    /// 调度器检查间隔（秒）
    pub tick_interval_secs: u64,
    /// 是否启用调度器
    pub scheduler_enabled: bool,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("data/backups"),
            tick_interval_secs: 60,
            scheduler_enabled: true,
        }
    }
}

/// 节点角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    /// 持有权威配置
    #[default]
    Master,
    /// 从主节点拉取配置
    Slave,
}

/// 节点角色与同步配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// 当前节点角色
    pub role: NodeRole,
    /// 主节点地址（仅从节点）
    pub master_url: Option<String>,
    /// 在主节点注册时获得的密钥（仅从节点）
    pub api_key: Option<String>,
    /// 拉取间隔（秒，仅从节点）
    pub sync_interval_secs: u64,
    /// 离线检查间隔（秒，仅主节点）
    pub health_check_interval_secs: u64,
    /// 超过该时长未收到心跳视为离线（秒）
    pub offline_threshold_secs: u64,
    /// 请求主节点超时（秒）
    pub request_timeout_secs: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            role: NodeRole::Master,
            master_url: None,
            api_key: None,
            sync_interval_secs: 60,
            health_check_interval_secs: 60,
            offline_threshold_secs: 300,
            request_timeout_secs: 30,
        }
    }
}

/// 运维令牌
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperatorToken {
    /// Bearer 令牌
    pub token: String,
    /// 令牌所属主体
    pub subject: String,
    /// 角色：admin / moderator / viewer
    pub role: String,
}

/// 管理接口认证配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagementConfig {
    /// 允许访问管理接口的令牌
    pub tokens: Vec<OperatorToken>,
}

impl AppConfig {
    /// 验证配置的有效性
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(config_error!("无效的服务器端口: {}", self.server.port));
        }

        self.database.validate()?;

        if self.backup.tick_interval_secs == 0 {
            return Err(config_error!("backup.tick_interval_secs 必须大于0"));
        }

        if self.node.health_check_interval_secs == 0 || self.node.sync_interval_secs == 0 {
            return Err(config_error!("节点检查与同步间隔必须大于0"));
        }

        if self.node.role == NodeRole::Slave {
            if self.node.master_url.as_deref().is_none_or(str::is_empty) {
                return Err(config_error!("从节点必须配置 node.master_url"));
            }
            if self.node.api_key.as_deref().is_none_or(str::is_empty) {
                return Err(config_error!("从节点必须配置 node.api_key"));
            }
        }

        for token in &self.management.tokens {
            if token.token.is_empty() {
                return Err(config_error!("运维令牌不能为空: {}", token.subject));
            }
            if !matches!(token.role.as_str(), "admin" | "moderator" | "viewer") {
                return Err(config_error!("未知角色 {} ({})", token.role, token.subject));
            }
        }

        Ok(())
    }

    /// 管理接口监听地址
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// 是否为从节点
    pub const fn is_slave(&self) -> bool {
        matches!(self.node.role, NodeRole::Slave)
    }
}
