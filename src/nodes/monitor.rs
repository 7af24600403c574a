//! # 从节点存活检查
//!
//! 定期把超过阈值未发送心跳的在线节点批量标记为离线

use super::registry::{STATUS_OFFLINE, STATUS_ONLINE};
use crate::error::Result;
use crate::utils::SharedClock;
use crate::{ldebug, lerror, linfo, logging::{LogComponent, LogStage}};
use entity::{SlaveNodes, slave_nodes};
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_OFFLINE_THRESHOLD: Duration = Duration::from_secs(300);

pub struct NodeHealthMonitor {
    db: Arc<DatabaseConnection>,
    clock: SharedClock,
    check_interval: Duration,
    offline_threshold: Duration,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl NodeHealthMonitor {
    pub fn new(db: Arc<DatabaseConnection>, clock: SharedClock) -> Self {
        Self::with_intervals(db, clock, DEFAULT_CHECK_INTERVAL, DEFAULT_OFFLINE_THRESHOLD)
    }

    pub fn with_intervals(
        db: Arc<DatabaseConnection>,
        clock: SharedClock,
        check_interval: Duration,
        offline_threshold: Duration,
    ) -> Self {
        Self {
            db,
            clock,
            check_interval,
            offline_threshold,
            task: Mutex::new(None),
        }
    }

    /// 执行一次检查，返回被标记为离线的节点数
    pub async fn sweep(&self) -> Result<u64> {
        let threshold = chrono::Duration::from_std(self.offline_threshold)
            .unwrap_or_else(|_| chrono::Duration::minutes(5));
        let now = self.clock.now();
        let cutoff = now - threshold;

        let result = SlaveNodes::update_many()
            .col_expr(slave_nodes::Column::Status, Expr::value(STATUS_OFFLINE))
            .col_expr(slave_nodes::Column::UpdatedAt, Expr::value(now))
            .filter(slave_nodes::Column::Status.eq(STATUS_ONLINE))
            .filter(slave_nodes::Column::LastSeen.lt(cutoff))
            .exec(self.db.as_ref())
            .await?;

        if result.rows_affected > 0 {
            linfo!(
                "system",
                LogStage::BackgroundTask,
                LogComponent::HealthMonitor,
                "sweep",
                "从节点心跳超时，已标记为离线",
                count = result.rows_affected
            );
        } else {
            ldebug!("system", LogStage::BackgroundTask, LogComponent::HealthMonitor, "sweep", "没有超时的从节点");
        }

        Ok(result.rows_affected)
    }

    /// 启动周期检查；重复调用无效果
    pub async fn start(self: &Arc<Self>) {
        let mut guard = self.task.lock().await;
        if guard.is_some() {
            return;
        }

        let monitor = Arc::clone(self);
        *guard = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(monitor.check_interval);
            loop {
                ticker.tick().await;
                if let Err(e) = monitor.sweep().await {
                    lerror!(
                        "system",
                        LogStage::BackgroundTask,
                        LogComponent::HealthMonitor,
                        "sweep",
                        "从节点存活检查失败",
                        error = %e
                    );
                }
            }
        }));

        linfo!(
            "system",
            LogStage::Startup,
            LogComponent::HealthMonitor,
            "start",
            "从节点存活检查已启动",
            interval_secs = self.check_interval.as_secs()
        );
    }

    pub async fn stop(&self) {
        if let Some(task) = self.task.lock().await.take() {
            task.abort();
            linfo!("system", LogStage::Shutdown, LogComponent::HealthMonitor, "stop", "从节点存活检查已停止");
        }
    }

    pub async fn is_running(&self) -> bool {
        self.task.lock().await.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{self, fixtures};
    use crate::utils::ManualClock;
    use chrono::{TimeZone, Utc};

    #[tokio::test]
    async fn test_sweep_only_touches_stale_online_nodes() {
        let db = Arc::new(testing::create_test_db().await);
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let clock = Arc::new(ManualClock::new(now));

        let stale = fixtures::insert_slave_node(&db, "stale", "k1", STATUS_ONLINE, Some(now - chrono::Duration::minutes(10))).await;
        let fresh = fixtures::insert_slave_node(&db, "fresh", "k2", STATUS_ONLINE, Some(now - chrono::Duration::minutes(1))).await;
        let offline = fixtures::insert_slave_node(&db, "offline", "k3", STATUS_OFFLINE, Some(now - chrono::Duration::hours(2))).await;

        let monitor = NodeHealthMonitor::new(db.clone(), clock.clone());
        assert_eq!(monitor.sweep().await.unwrap(), 1);

        let status = |id| {
            let db = db.clone();
            async move { SlaveNodes::find_by_id(id).one(db.as_ref()).await.unwrap().unwrap().status }
        };
        assert_eq!(status(stale.id).await, STATUS_OFFLINE);
        assert_eq!(status(fresh.id).await, STATUS_ONLINE);
        assert_eq!(status(offline.id).await, STATUS_OFFLINE);

        // 无超时节点时不做任何修改
        assert_eq!(monitor.sweep().await.unwrap(), 0);

        clock.advance(chrono::Duration::minutes(5));
        assert_eq!(monitor.sweep().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_start_and_stop() {
        let db = Arc::new(testing::create_test_db().await);
        let monitor = Arc::new(NodeHealthMonitor::with_intervals(
            db,
            crate::utils::SystemClock::shared(),
            Duration::from_millis(20),
            DEFAULT_OFFLINE_THRESHOLD,
        ));

        monitor.start().await;
        monitor.start().await;
        assert!(monitor.is_running().await);
        tokio::time::sleep(Duration::from_millis(50)).await;

        monitor.stop().await;
        assert!(!monitor.is_running().await);
    }
}
