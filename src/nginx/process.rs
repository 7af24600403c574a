//! # nginx 进程控制

use crate::config::NginxConfig;
use crate::error::{FleetError, Result};
use async_trait::async_trait;
use std::time::Duration;
use tokio::process::Command;

const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// 外部代理进程控制
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ProcessControl: Send + Sync {
    /// 校验配置文件语法
    async fn test_config(&self) -> Result<()>;
    /// 平滑重载
    async fn reload(&self) -> Result<()>;
    /// 主重载方式失败时的备用方式
    async fn reload_alternate(&self) -> Result<()>;
}

/// 基于 nginx 可执行文件的实现
#[derive(Debug, Clone)]
pub struct NginxProcess {
    binary: String,
    alternate: Vec<String>,
}

impl NginxProcess {
    #[must_use]
    pub fn new(config: &NginxConfig) -> Self {
        Self {
            binary: config.binary.clone(),
            alternate: config.alternate_reload.clone(),
        }
    }
}

#[async_trait]
impl ProcessControl for NginxProcess {
    async fn test_config(&self) -> Result<()> {
        run(&self.binary, &["-t"]).await
    }

    async fn reload(&self) -> Result<()> {
        run(&self.binary, &["-s", "reload"]).await
    }

    async fn reload_alternate(&self) -> Result<()> {
        let Some((program, args)) = self.alternate.split_first() else {
            return Err(FleetError::external_process("未配置备用重载命令"));
        };
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        run(program, &args).await
    }
}

async fn run(program: &str, args: &[&str]) -> Result<()> {
    let mut cmd = Command::new(program);
    cmd.args(args).kill_on_drop(true);

    let output = tokio::time::timeout(COMMAND_TIMEOUT, cmd.output())
        .await
        .map_err(|_| FleetError::external_process(format!("{program} {} 执行超时", args.join(" "))))?
        .map_err(|e| FleetError::external_process(format!("无法执行 {program}: {e}")))?;

    if output.status.success() {
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    Err(FleetError::external_process(format!(
        "{program} {} 失败 ({}): {}",
        args.join(" "),
        output.status,
        stderr.trim()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_binary_is_external_process_error() {
        let process = NginxProcess {
            binary: "/nonexistent/nginx".to_string(),
            alternate: Vec::new(),
        };
        assert!(matches!(
            process.test_config().await,
            Err(FleetError::ExternalProcess { .. })
        ));
        assert!(process.reload_alternate().await.is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_alternate_command_runs() {
        let process = NginxProcess {
            binary: "false".to_string(),
            alternate: vec!["true".to_string()],
        };
        assert!(process.reload().await.is_err());
        assert!(process.reload_alternate().await.is_ok());
    }
}
