//! # 配置快照
//!
//! 快照构建、摘要计算与按策略表导入

pub mod builder;
pub mod hasher;
pub mod importer;
pub mod model;
pub mod policy;
pub mod report;

pub use builder::SnapshotBuilder;
pub use hasher::{canonicalize, digest};
pub use importer::{ImportPlan, ReconciliationImporter};
pub use model::{BackupSnapshot, SnapshotCounts, SyncConfig};
pub use policy::{EntityKind, EntityPolicy, IMPORT_POLICIES, ImportPolicy};
pub use report::{ChangeReport, StepOutcome, StepSummary};
