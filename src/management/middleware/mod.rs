//! # 管理接口中间件

pub mod auth;

pub use auth::{AuthContext, OperatorRole, operator_auth, slave_api_key};
