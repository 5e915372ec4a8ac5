//! 错误代码定义
//!
//! 错误代码按类别分组，每个类别占用1000个代码范围：
//! - 1000-1999: 配置相关错误
//! - 2000-2999: 服务注册相关错误
//! - 3000-3999: 负载均衡/拨号相关错误
//! - 4000-4999: 生命周期相关错误
//! - 9000-9999: 通用错误
//!
//! `0` 保留表示"无错误"，永远不会出现在 `FlareError` 中。

use serde::{Deserialize, Serialize};
use std::fmt;

/// 知名错误代码
///
/// 跨进程传输时只传递数字值，未知数字同样可以通过 `FlareError::new` 表示。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(i32)]
pub enum ErrorCode {
    // ============================================================
    // 配置相关错误 (1000-1999)
    // ============================================================
    ConfigurationError = 1000,
    MissingServiceInfo = 1001,
    NoEndpoints = 1002,
    DuplicateEndpoint = 1003,
    InvalidAddress = 1004,
    TlsConfigError = 1005,

    // ============================================================
    // 服务注册相关错误 (2000-2999)
    // ============================================================
    RegistrationFailed = 2000,
    DeregistrationFailed = 2001,
    DiscoveryUnavailable = 2002,

    // ============================================================
    // 负载均衡/拨号相关错误 (3000-3999)
    // ============================================================
    NoBackendAvailable = 3000,
    DialFailed = 3001,
    UnsupportedNetwork = 3002,

    // ============================================================
    // 生命周期相关错误 (4000-4999)
    // ============================================================
    InvalidState = 4000,
    ListenerStartFailed = 4001,
    ListenerFailed = 4002,
    ServiceInitFailed = 4003,
    ServiceStartFailed = 4004,

    // ============================================================
    // 通用错误 (9000-9999)
    // ============================================================
    Cancelled = 9000,
    Timeout = 9001,
    Io = 9002,
    Serialization = 9003,
    Internal = 9004,
    Unknown = 9999,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl ErrorCode {
    /// 获取错误代码的数字值
    #[inline]
    pub fn as_i32(&self) -> i32 {
        *self as i32
    }

    /// 从数字值还原知名错误代码
    pub fn from_i32(code: i32) -> Option<Self> {
        match code {
            1000 => Some(ErrorCode::ConfigurationError),
            1001 => Some(ErrorCode::MissingServiceInfo),
            1002 => Some(ErrorCode::NoEndpoints),
            1003 => Some(ErrorCode::DuplicateEndpoint),
            1004 => Some(ErrorCode::InvalidAddress),
            1005 => Some(ErrorCode::TlsConfigError),
            2000 => Some(ErrorCode::RegistrationFailed),
            2001 => Some(ErrorCode::DeregistrationFailed),
            2002 => Some(ErrorCode::DiscoveryUnavailable),
            3000 => Some(ErrorCode::NoBackendAvailable),
            3001 => Some(ErrorCode::DialFailed),
            3002 => Some(ErrorCode::UnsupportedNetwork),
            4000 => Some(ErrorCode::InvalidState),
            4001 => Some(ErrorCode::ListenerStartFailed),
            4002 => Some(ErrorCode::ListenerFailed),
            4003 => Some(ErrorCode::ServiceInitFailed),
            4004 => Some(ErrorCode::ServiceStartFailed),
            9000 => Some(ErrorCode::Cancelled),
            9001 => Some(ErrorCode::Timeout),
            9002 => Some(ErrorCode::Io),
            9003 => Some(ErrorCode::Serialization),
            9004 => Some(ErrorCode::Internal),
            9999 => Some(ErrorCode::Unknown),
            _ => None,
        }
    }

    /// 获取错误代码的英文标识符
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ConfigurationError => "CONFIGURATION_ERROR",
            ErrorCode::MissingServiceInfo => "MISSING_SERVICE_INFO",
            ErrorCode::NoEndpoints => "NO_ENDPOINTS",
            ErrorCode::DuplicateEndpoint => "DUPLICATE_ENDPOINT",
            ErrorCode::InvalidAddress => "INVALID_ADDRESS",
            ErrorCode::TlsConfigError => "TLS_CONFIG_ERROR",
            ErrorCode::RegistrationFailed => "REGISTRATION_FAILED",
            ErrorCode::DeregistrationFailed => "DEREGISTRATION_FAILED",
            ErrorCode::DiscoveryUnavailable => "DISCOVERY_UNAVAILABLE",
            ErrorCode::NoBackendAvailable => "NO_BACKEND_AVAILABLE",
            ErrorCode::DialFailed => "DIAL_FAILED",
            ErrorCode::UnsupportedNetwork => "UNSUPPORTED_NETWORK",
            ErrorCode::InvalidState => "INVALID_STATE",
            ErrorCode::ListenerStartFailed => "LISTENER_START_FAILED",
            ErrorCode::ListenerFailed => "LISTENER_FAILED",
            ErrorCode::ServiceInitFailed => "SERVICE_INIT_FAILED",
            ErrorCode::ServiceStartFailed => "SERVICE_START_FAILED",
            ErrorCode::Cancelled => "CANCELLED",
            ErrorCode::Timeout => "TIMEOUT",
            ErrorCode::Io => "IO",
            ErrorCode::Serialization => "SERIALIZATION",
            ErrorCode::Internal => "INTERNAL",
            ErrorCode::Unknown => "UNKNOWN",
        }
    }

    /// 获取错误代码的类别
    pub fn category(&self) -> ErrorCategory {
        match self.as_i32() {
            1000..=1999 => ErrorCategory::Configuration,
            2000..=2999 => ErrorCategory::Registration,
            3000..=3999 => ErrorCategory::Balance,
            4000..=4999 => ErrorCategory::Lifecycle,
            _ => ErrorCategory::General,
        }
    }
}

impl From<ErrorCode> for i32 {
    fn from(code: ErrorCode) -> Self {
        code.as_i32()
    }
}

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCategory {
    Configuration,
    Registration,
    Balance,
    Lifecycle,
    General,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Configuration => write!(f, "CONFIGURATION"),
            ErrorCategory::Registration => write!(f, "REGISTRATION"),
            ErrorCategory::Balance => write!(f, "BALANCE"),
            ErrorCategory::Lifecycle => write!(f, "LIFECYCLE"),
            ErrorCategory::General => write!(f, "GENERAL"),
        }
    }
}
