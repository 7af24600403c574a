//! # 认证中间件
//!
//! 运维接口使用 `Authorization: Bearer <token>`，令牌在配置中声明并绑定角色；
//! 从节点接口使用 `X-Slave-API-Key`

use crate::error::{FleetError, Result};
use crate::management::server::AppState;
use crate::nodes::SLAVE_API_KEY_HEADER;
use axum::{
    extract::{Request, State},
    http::{HeaderMap, header::AUTHORIZATION},
    middleware::Next,
    response::{IntoResponse, Response},
};

/// 运维角色
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorRole {
    Admin,
    Moderator,
    Viewer,
}

impl OperatorRole {
    fn parse(role: &str) -> Option<Self> {
        match role {
            "admin" => Some(Self::Admin),
            "moderator" => Some(Self::Moderator),
            "viewer" => Some(Self::Viewer),
            _ => None,
        }
    }
}

/// 已认证的运维身份
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub subject: String,
    pub role: OperatorRole,
}

impl AuthContext {
    /// 修改类操作只允许 admin
    pub fn require_admin(&self) -> Result<()> {
        if self.role == OperatorRole::Admin {
            Ok(())
        } else {
            Err(FleetError::permission(format!("{} 无权执行此操作", self.subject)))
        }
    }
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// 校验 Bearer 令牌并把 [`AuthContext`] 放入请求扩展
pub async fn operator_auth(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let Some(token) = extract_bearer_token(request.headers()) else {
        return FleetError::auth("缺少 Bearer 令牌").into_response();
    };

    let context = state
        .config
        .management
        .tokens
        .iter()
        .find(|t| t.token == token)
        .and_then(|t| {
            OperatorRole::parse(&t.role).map(|role| AuthContext {
                subject: t.subject.clone(),
                role,
            })
        });

    match context {
        Some(context) => {
            request.extensions_mut().insert(context);
            next.run(request).await
        }
        None => FleetError::auth("无效的令牌").into_response(),
    }
}

/// 读取从节点密钥请求头
pub fn slave_api_key(headers: &HeaderMap) -> Result<&str> {
    headers
        .get(SLAVE_API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| FleetError::auth(format!("缺少 {SLAVE_API_KEY_HEADER} 请求头")))
}
