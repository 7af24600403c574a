//! # Proxy Fleet
//!
//! nginx 反向代理节点集群的控制面：配置快照与摘要、主从同步、
//! 从节点存活检查、定时备份与 vhost 发布

pub mod app;
pub mod backup;
pub mod config;
pub mod database;
pub mod error;
pub mod logging;
pub mod management;
pub mod nginx;
pub mod nodes;
pub mod snapshot;
pub mod testing;
pub mod utils;

pub use config::AppConfig;
pub use error::{FleetError, Result};
