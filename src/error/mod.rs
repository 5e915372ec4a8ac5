//! 错误处理模块
//!
//! 提供统一的结构化错误 (scope, code, message)，支持幂等包装和跨进程序列化

pub mod code;
pub mod conversions;
pub mod flare_error;
#[cfg(feature = "grpc")]
pub mod grpc;
pub mod wire;

pub use code::{ErrorCategory, ErrorCode};
pub use flare_error::{FlareError, Result, ResultExt};
pub use wire::{deserialize_error, serialize_error};

/// 各子系统的错误来源标识
pub mod scope {
    pub const CONFIG: &str = "Config";
    pub const CODEC: &str = "Codec";
    pub const IO: &str = "Io";
    pub const DISCOVERY: &str = "Discovery";
    pub const REGISTRAR: &str = "ServiceRegistrar";
    pub const BALANCER: &str = "Balancer";
    pub const DIALER: &str = "BalancedDialer";
    pub const LISTENER: &str = "HttpListener";
    pub const RUNTIME: &str = "ServiceRuntime";
    pub const LOGGING: &str = "Logging";
    pub const GRPC: &str = "Grpc";
}
