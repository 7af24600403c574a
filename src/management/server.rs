//! # 管理服务器
//!
//! Axum HTTP 服务器，承载主从同步、从节点管理与备份接口

use crate::app::context::AppContext;
use crate::error::{FleetError, Result};
use crate::{linfo, logging::{LogComponent, LogStage}};
use axum::Router;
use axum::routing::get;
use std::future::Future;
use std::ops::Deref;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// 管理服务器应用状态
#[derive(Clone)]
pub struct AppState {
    context: Arc<AppContext>,
}

impl AppState {
    #[must_use]
    pub const fn new(context: Arc<AppContext>) -> Self {
        Self { context }
    }
}

impl Deref for AppState {
    type Target = AppContext;

    fn deref(&self) -> &Self::Target {
        &self.context
    }
}

pub struct ManagementServer {
    router: Router,
    listen_addr: String,
}

impl ManagementServer {
    pub fn new(context: Arc<AppContext>) -> Self {
        let listen_addr = context.config.listen_addr();
        Self {
            router: build_router(AppState::new(context)),
            listen_addr,
        }
    }

    #[must_use]
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// 监听并服务，直到 `shutdown` 完成
    pub async fn serve<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(&self.listen_addr)
            .await
            .map_err(|e| FleetError::io(format!("无法监听 {}", self.listen_addr), e))?;

        linfo!(
            "system",
            LogStage::Startup,
            LogComponent::Management,
            "serve",
            "管理接口已启动",
            addr = %self.listen_addr
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| FleetError::io("管理接口异常退出", e))
    }
}

/// 组装完整路由与中间件
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .nest("/api", super::routes::create_routes(state))
        .route("/ping", get(|| async { "pong" }))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(cors))
}
