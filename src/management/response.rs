//! # API 响应结构
//!
//! 所有接口统一返回 `{success, data, message, timestamp}`，失败时附带错误码

use crate::error::{ErrorCategory, FleetError};
use crate::{lerror, logging::{LogComponent, LogStage}};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// 标准响应外壳
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<&'static str>,
    pub timestamp: DateTime<Utc>,
}

/// API 响应
#[derive(Debug)]
pub enum ApiResponse<T: Serialize> {
    Success(T),
    SuccessWithMessage(T, String),
    SuccessWithoutData(String),
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let (data, message) = match self {
            Self::Success(data) => (Some(data), None),
            Self::SuccessWithMessage(data, message) => (Some(data), Some(message)),
            Self::SuccessWithoutData(message) => (None, Some(message)),
        };
        (
            StatusCode::OK,
            Json(Envelope {
                success: true,
                data,
                message,
                code: None,
                timestamp: Utc::now(),
            }),
        )
            .into_response()
    }
}

impl IntoResponse for FleetError {
    fn into_response(self) -> Response {
        let (status, code) = self.to_http_response_parts();
        if self.category() == ErrorCategory::Server {
            lerror!(
                "system",
                LogStage::Request,
                LogComponent::Management,
                "respond",
                "管理接口请求失败",
                error = %self,
                code = code
            );
        }
        (
            status,
            Json(Envelope::<()> {
                success: false,
                data: None,
                message: Some(self.to_string()),
                code: Some(code),
                timestamp: Utc::now(),
            }),
        )
            .into_response()
    }
}

/// 成功响应
pub fn success<T: Serialize>(data: T) -> ApiResponse<T> {
    ApiResponse::Success(data)
}

/// 带消息的成功响应
pub fn success_with_message<T: Serialize>(data: T, message: &str) -> ApiResponse<T> {
    ApiResponse::SuccessWithMessage(data, message.to_string())
}

/// 无数据的成功响应
pub fn success_without_data(message: &str) -> ApiResponse<()> {
    ApiResponse::SuccessWithoutData(message.to_string())
}
