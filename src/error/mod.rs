//! # 错误处理
//!
//! 全部模块共用 [`FleetError`]；管理接口按错误类型映射 HTTP 状态码

pub mod macros;
pub mod types;

pub use types::FleetError;

/// 统一的 `Result` 类型
pub type Result<T> = std::result::Result<T, FleetError>;

/// 为错误附加上下文，保留内层错误的状态码
pub trait Context<T> {
    #[track_caller]
    fn context<C>(self, context: C) -> Result<T>
    where
        C: std::fmt::Display;

    #[track_caller]
    fn with_context<C, F>(self, context: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: std::fmt::Display;
}

impl<T, E> Context<T> for std::result::Result<T, E>
where
    E: Into<FleetError>,
{
    fn context<C>(self, context: C) -> Result<T>
    where
        C: std::fmt::Display,
    {
        self.with_context(|| context)
    }

    fn with_context<C, F>(self, context: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: std::fmt::Display,
    {
        self.map_err(|error| FleetError::Context {
            context: context().to_string(),
            source: Box::new(error.into()),
        })
    }
}

/// 错误归类：客户端输入问题或服务端故障
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// 4xx
    Client,
    /// 5xx
    Server,
}
