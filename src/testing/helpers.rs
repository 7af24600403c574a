//! # 测试辅助函数

use crate::nginx::NginxPaths;
use sea_orm::{Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use std::sync::Once;
use tempfile::TempDir;

static INIT: Once = Once::new();

/// 初始化测试日志
pub fn init_test_env() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("debug,sqlx=warn,sea_orm=warn")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// 创建已迁移的内存数据库
pub async fn create_test_db() -> DatabaseConnection {
    init_test_env();
    let db = Database::connect("sqlite::memory:")
        .await
        .expect("连接内存数据库失败");
    migration::Migrator::up(&db, None)
        .await
        .expect("运行迁移失败");
    db
}

/// 创建临时 nginx 目录布局
pub fn create_nginx_layout() -> (NginxPaths, TempDir) {
    let dir = tempfile::tempdir().expect("创建临时目录失败");
    let paths = NginxPaths::under(dir.path());
    std::fs::create_dir_all(&paths.sites_available).expect("创建 sites-available 失败");
    std::fs::create_dir_all(&paths.sites_enabled).expect("创建 sites-enabled 失败");
    std::fs::create_dir_all(&paths.certs_dir).expect("创建证书目录失败");
    (paths, dir)
}
