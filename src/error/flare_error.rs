//! 统一错误类型
//!
//! `FlareError` 由 (scope, code, message) 三元组构成，构造后不可变，
//! 可以直接用于本地决策，也可以序列化后跨进程传递。

use super::code::ErrorCode;
use serde::Serialize;
use std::error::Error as StdError;
use thiserror::Error;

/// 统一错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[error("[{scope}] {code}: {message}")]
pub struct FlareError {
    scope: String,
    code: i32,
    message: String,
}

impl FlareError {
    /// 创建新的错误
    ///
    /// `code` 为 0 时会被替换为 [`ErrorCode::Unknown`]，0 只表示"无错误"。
    pub fn new(code: impl Into<i32>, scope: impl Into<String>, message: impl Into<String>) -> Self {
        let code = match code.into() {
            0 => ErrorCode::Unknown.as_i32(),
            code => code,
        };
        Self {
            scope: scope.into(),
            code,
            message: message.into(),
        }
    }

    /// 包装一个底层错误
    ///
    /// 如果 `err` 本身已经是 `FlareError`，原样返回（保留原有的 code/scope），
    /// 否则使用给定的 code/scope 和 `err` 的消息构建新的错误。
    pub fn wrap<E>(code: impl Into<i32>, scope: impl Into<String>, err: E) -> Self
    where
        E: Into<Box<dyn StdError + Send + Sync>>,
    {
        match err.into().downcast::<FlareError>() {
            Ok(inner) => *inner,
            Err(other) => Self::new(code, scope, other.to_string()),
        }
    }

    /// 错误代码
    pub fn code(&self) -> i32 {
        self.code
    }

    /// 产生错误的子系统
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// 错误消息
    pub fn message(&self) -> &str {
        &self.message
    }

    /// 转换为知名错误代码（如果是的话）
    pub fn error_code(&self) -> Option<ErrorCode> {
        ErrorCode::from_i32(self.code)
    }

    /// 判断是否为指定的错误代码
    pub fn is(&self, code: ErrorCode) -> bool {
        self.code == code.as_i32()
    }

    // ============================================================
    // 便捷方法
    // ============================================================

    pub fn configuration(scope: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigurationError, scope, message)
    }

    pub fn invalid_address(scope: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidAddress, scope, message)
    }

    pub fn no_endpoints(scope: impl Into<String>) -> Self {
        Self::new(ErrorCode::NoEndpoints, scope, "service did not provide any endpoint")
    }

    pub fn duplicate_endpoint(scope: impl Into<String>, method: &str, path: &str) -> Self {
        Self::new(
            ErrorCode::DuplicateEndpoint,
            scope,
            format!("endpoint [{}] {} is already registered", method, path),
        )
    }

    pub fn registration_failed(scope: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCode::RegistrationFailed, scope, message)
    }

    pub fn no_backend(scope: impl Into<String>, service_name: &str) -> Self {
        Self::new(
            ErrorCode::NoBackendAvailable,
            scope,
            format!("no backend available for service '{}'", service_name),
        )
    }

    pub fn invalid_state(scope: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidState, scope, message)
    }

    pub fn cancelled(scope: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Cancelled, scope, message)
    }
}

/// `Result` 的扩展，把任意错误包装为 `FlareError`
pub trait ResultExt<T> {
    fn wrap_err(self, code: impl Into<i32>, scope: &str) -> Result<T>;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<Box<dyn StdError + Send + Sync>>,
{
    fn wrap_err(self, code: impl Into<i32>, scope: &str) -> Result<T> {
        self.map_err(|err| FlareError::wrap(code, scope, err))
    }
}

/// 结果类型别名
pub type Result<T> = std::result::Result<T, FlareError>;
