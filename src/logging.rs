//! # 日志配置模块
//!
//! 统一的结构化日志：每条日志都带有 `request_id`、阶段、组件与操作名，
//! 便于在多节点环境中按操作检索

use std::env;
use std::fmt;
use tracing_subscriber::{EnvFilter, fmt as tracing_fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// 日志所处的生命周期阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStage {
    Startup,
    Shutdown,
    BackgroundTask,
    Snapshot,
    Import,
    Backup,
    NodeSync,
    Publish,
    Request,
}

impl LogStage {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Startup => "startup",
            Self::Shutdown => "shutdown",
            Self::BackgroundTask => "background_task",
            Self::Snapshot => "snapshot",
            Self::Import => "import",
            Self::Backup => "backup",
            Self::NodeSync => "node_sync",
            Self::Publish => "publish",
            Self::Request => "request",
        }
    }
}

impl fmt::Display for LogStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 产生日志的组件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogComponent {
    Main,
    Config,
    Database,
    TaskScheduler,
    SnapshotBuilder,
    SnapshotHasher,
    Importer,
    NodeRegistry,
    HealthMonitor,
    SyncClient,
    BackupScheduler,
    BackupService,
    Publisher,
    Management,
}

impl LogComponent {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::Config => "config",
            Self::Database => "database",
            Self::TaskScheduler => "task_scheduler",
            Self::SnapshotBuilder => "snapshot_builder",
            Self::SnapshotHasher => "snapshot_hasher",
            Self::Importer => "importer",
            Self::NodeRegistry => "node_registry",
            Self::HealthMonitor => "health_monitor",
            Self::SyncClient => "sync_client",
            Self::BackupScheduler => "backup_scheduler",
            Self::BackupService => "backup_service",
            Self::Publisher => "publisher",
            Self::Management => "management",
        }
    }
}

impl fmt::Display for LogComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 结构化 info 日志
#[macro_export]
macro_rules! linfo {
    ($request_id:expr, $stage:expr, $component:expr, $operation:expr, $description:expr) => {
        ::tracing::info!(
            request_id = %$request_id,
            stage = %$stage,
            component = %$component,
            operation = %$operation,
            "{}",
            $description
        )
    };
    ($request_id:expr, $stage:expr, $component:expr, $operation:expr, $description:expr, $($fields:tt)+) => {
        ::tracing::info!(
            request_id = %$request_id,
            stage = %$stage,
            component = %$component,
            operation = %$operation,
            $($fields)+,
            "{}",
            $description
        )
    };
}

/// 结构化 warn 日志
#[macro_export]
macro_rules! lwarn {
    ($request_id:expr, $stage:expr, $component:expr, $operation:expr, $description:expr) => {
        ::tracing::warn!(
            request_id = %$request_id,
            stage = %$stage,
            component = %$component,
            operation = %$operation,
            "{}",
            $description
        )
    };
    ($request_id:expr, $stage:expr, $component:expr, $operation:expr, $description:expr, $($fields:tt)+) => {
        ::tracing::warn!(
            request_id = %$request_id,
            stage = %$stage,
            component = %$component,
            operation = %$operation,
            $($fields)+,
            "{}",
            $description
        )
    };
}

/// 结构化 error 日志
#[macro_export]
macro_rules! lerror {
    ($request_id:expr, $stage:expr, $component:expr, $operation:expr, $description:expr) => {
        ::tracing::error!(
            request_id = %$request_id,
            stage = %$stage,
            component = %$component,
            operation = %$operation,
            "{}",
            $description
        )
    };
    ($request_id:expr, $stage:expr, $component:expr, $operation:expr, $description:expr, $($fields:tt)+) => {
        ::tracing::error!(
            request_id = %$request_id,
            stage = %$stage,
            component = %$component,
            operation = %$operation,
            $($fields)+,
            "{}",
            $description
        )
    };
}

/// 结构化 debug 日志
#[macro_export]
macro_rules! ldebug {
    ($request_id:expr, $stage:expr, $component:expr, $operation:expr, $description:expr) => {
        ::tracing::debug!(
            request_id = %$request_id,
            stage = %$stage,
            component = %$component,
            operation = %$operation,
            "{}",
            $description
        )
    };
    ($request_id:expr, $stage:expr, $component:expr, $operation:expr, $description:expr, $($fields:tt)+) => {
        ::tracing::debug!(
            request_id = %$request_id,
            stage = %$stage,
            component = %$component,
            operation = %$operation,
            $($fields)+,
            "{}",
            $description
        )
    };
}

/// 初始化日志系统
///
/// 优先使用 `RUST_LOG`，否则使用传入级别并关闭 SQL 语句日志
pub fn init_logging(log_level: Option<&str>) {
    let level = log_level.unwrap_or("info");
    let default_filter = format!("{level},proxy_fleet=debug,sqlx::query=off,sea_orm::query=warn,sqlx=warn");

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let initialized = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_thread_ids(false)
                .with_thread_names(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .try_init()
        .is_ok();

    if initialized
        && env::var("RUST_LOG").is_ok_and(|v| v.contains("sqlx::query=info") || v.contains("sqlx::query=debug"))
    {
        tracing::info!("🔍 SQLx database query logging enabled");
    }
}
