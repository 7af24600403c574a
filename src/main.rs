//! # Proxy Fleet 主程序

use clap::Parser;
use proxy_fleet::{
    app::{AppContext, AppTasks},
    config, database, lerror, linfo,
    logging::{self, LogComponent, LogStage},
    management::ManagementServer,
};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Parser)]
#[command(name = "proxy-fleet", version, about = "nginx 反向代理集群控制面")]
struct Cli {
    /// 配置文件路径，默认 config/config.{RUST_ENV}.toml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 日志级别，`RUST_LOG` 优先
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.log_level.as_deref());

    let config = Arc::new(
        config::load_config(cli.config.as_deref())
            .map_err(|e| anyhow::anyhow!("配置加载失败: {e}"))?,
    );

    let db = database::init_database(&config.database)
        .await
        .map_err(|e| anyhow::anyhow!("数据库连接失败: {e}"))?;
    database::run_migrations(&db)
        .await
        .map_err(|e| anyhow::anyhow!("数据库迁移失败: {e}"))?;

    let context = Arc::new(AppContext::from_config(config.clone(), Arc::new(db))?);
    let tasks = AppTasks::initialize(&context).await?;
    tasks.start_all().await?;

    linfo!(
        "system",
        LogStage::Startup,
        LogComponent::Main,
        "service_starting",
        "服务启动",
        role = ?config.node.role,
        addr = %config.listen_addr()
    );

    let server = ManagementServer::new(context);
    let result = server
        .serve(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                lerror!(
                    "system",
                    LogStage::Shutdown,
                    LogComponent::Main,
                    "signal",
                    "无法监听退出信号",
                    error = %e
                );
            }
        })
        .await;

    if let Err(e) = tasks.shutdown().await {
        lerror!(
            "system",
            LogStage::Shutdown,
            LogComponent::Main,
            "shutdown",
            "后台任务未能正常停止",
            error = %e
        );
    }

    linfo!("system", LogStage::Shutdown, LogComponent::Main, "service_shutdown", "服务正常关闭");
    result.map_err(Into::into)
}
