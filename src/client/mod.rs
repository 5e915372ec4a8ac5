//! 客户端模块
//!
//! 提供基于负载均衡的 TCP 拨号器、配置，以及接入 HTTP / gRPC 客户端的连接器

mod connection;
mod connector;
mod dialer;

pub use connection::BalancedConnection;
pub use connector::{BalancedConnector, BalancedHttpClient};
pub use dialer::BalancedDialer;

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::balancer::Balancer;

/// 拨号器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialerConfig {
    /// 单次连接超时（毫秒）
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// 开启 TCP keep-alive
    #[serde(default = "default_true")]
    pub keep_alive: bool,
    /// 关闭 Nagle 算法
    #[serde(default = "default_true")]
    pub nodelay: bool,
    /// 单次拨号最多尝试的后端数，包含第一次
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
}

fn default_connect_timeout_ms() -> u64 {
    3000
}

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> usize {
    2
}

impl Default for DialerConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout_ms(),
            keep_alive: true,
            nodelay: true,
            max_attempts: default_max_attempts(),
        }
    }
}

impl DialerConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

/// 拨号器构建器
pub struct DialerBuilder {
    balancer: Arc<dyn Balancer>,
    config: DialerConfig,
}

impl DialerBuilder {
    pub fn new(balancer: Arc<dyn Balancer>) -> Self {
        Self {
            balancer,
            config: DialerConfig::default(),
        }
    }

    pub fn config(mut self, config: DialerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn keep_alive(mut self, keep_alive: bool) -> Self {
        self.config.keep_alive = keep_alive;
        self
    }

    pub fn nodelay(mut self, nodelay: bool) -> Self {
        self.config.nodelay = nodelay;
        self
    }

    pub fn max_attempts(mut self, attempts: usize) -> Self {
        self.config.max_attempts = attempts;
        self
    }

    pub fn build(self) -> BalancedDialer {
        BalancedDialer::new(self.balancer, self.config)
    }
}
