//! # 节点管理
//!
//! 从节点注册、存活检查与主从配置同步

pub mod client;
pub mod monitor;
pub mod registry;
pub mod sync;

pub use client::{MasterClient, MasterExport, PullResult, SLAVE_API_KEY_HEADER, SlaveSyncTask};
pub use monitor::NodeHealthMonitor;
pub use registry::{NodeRegistry, RegisterNode, STATUS_OFFLINE, STATUS_ONLINE, SyncSettings};
pub use sync::{NodeSyncService, SyncExport, SyncImportRequest, SyncOutcome};
