//! # 管理接口处理器

pub mod backup;
pub mod node_sync;
pub mod slave_nodes;
