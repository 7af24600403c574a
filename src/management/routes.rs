//! # 路由配置
//!
//! 从节点接口只校验节点密钥；其余接口都经过运维令牌认证

use crate::management::handlers::{backup, node_sync, slave_nodes};
use crate::management::middleware::operator_auth;
use crate::management::server::AppState;
use axum::Router;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};

/// 创建 `/api` 下的全部路由
pub fn create_routes(state: AppState) -> Router {
    let operator = Router::new()
        .nest("/node-sync", node_sync_routes())
        .nest("/slave-nodes", slave_node_routes())
        .nest("/backup", backup_routes())
        .route_layer(from_fn_with_state(state.clone(), operator_auth));

    Router::new()
        .route("/node-sync/export", get(node_sync::export_config))
        .route("/node-sync/health", get(node_sync::node_health))
        .merge(operator)
        .with_state(state)
}

fn node_sync_routes() -> Router<AppState> {
    Router::new()
        .route("/import", post(node_sync::import_config))
        .route("/digest", get(node_sync::current_digest))
}

fn slave_node_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(slave_nodes::list_nodes).post(slave_nodes::register_node))
        .route(
            "/{id}",
            get(slave_nodes::get_node)
                .patch(slave_nodes::update_node)
                .delete(slave_nodes::delete_node),
        )
}

fn backup_routes() -> Router<AppState> {
    Router::new()
        .route("/schedules", get(backup::list_schedules).post(backup::create_schedule))
        .route(
            "/schedules/{id}",
            get(backup::get_schedule)
                .put(backup::update_schedule)
                .delete(backup::delete_schedule),
        )
        .route("/schedules/{id}/run", post(backup::run_schedule))
        .route("/files", get(backup::list_files))
        .route("/files/{id}", axum::routing::delete(backup::delete_file))
        .route("/files/{id}/restore", post(backup::restore_file))
        .route("/export", get(backup::export_backup))
        .route("/import", post(backup::import_backup))
}
