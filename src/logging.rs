//! 日志初始化

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

use crate::error::{ErrorCode, FlareError, Result, scope};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LogConfig {
    /// `RUST_LOG` 未设置时使用的过滤级别
    #[serde(default = "default_level")]
    pub level: String,
    /// 输出 JSON 格式日志
    #[serde(default)]
    pub json: bool,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
        }
    }
}

/// 安装全局 tracing subscriber
///
/// 重复调用返回错误，不会 panic。
pub fn init_logging(config: &LogConfig) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let result = if config.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init()
    };

    result.map_err(|e| {
        FlareError::new(
            ErrorCode::Internal,
            scope::LOGGING,
            format!("failed to initialize tracing subscriber: {}", e),
        )
    })
}
