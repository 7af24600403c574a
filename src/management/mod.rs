//! # 管理 API 模块
//!
//! 主从同步、从节点与备份的 RESTful 接口

pub mod handlers;
pub mod middleware;
pub mod response;
pub mod routes;
pub mod server;

pub use routes::create_routes;
pub use server::{AppState, ManagementServer, build_router};
