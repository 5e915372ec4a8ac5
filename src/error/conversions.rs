//! 错误类型转换实现

use super::{ErrorCode, FlareError, scope};
use std::io;

impl From<io::Error> for FlareError {
    fn from(err: io::Error) -> Self {
        let code = match err.kind() {
            io::ErrorKind::TimedOut => ErrorCode::Timeout,
            _ => ErrorCode::Io,
        };
        FlareError::new(code, scope::IO, err.to_string())
    }
}

impl From<serde_json::Error> for FlareError {
    fn from(err: serde_json::Error) -> Self {
        FlareError::new(ErrorCode::Serialization, scope::CODEC, format!("JSON 序列化错误: {}", err))
    }
}

impl From<toml::de::Error> for FlareError {
    fn from(err: toml::de::Error) -> Self {
        FlareError::configuration(scope::CONFIG, format!("TOML 解析错误: {}", err))
    }
}

impl From<reqwest::Error> for FlareError {
    fn from(err: reqwest::Error) -> Self {
        let code = if err.is_timeout() {
            ErrorCode::Timeout
        } else if err.is_connect() {
            ErrorCode::DiscoveryUnavailable
        } else {
            ErrorCode::Io
        };
        FlareError::new(code, scope::DISCOVERY, err.to_string())
    }
}
