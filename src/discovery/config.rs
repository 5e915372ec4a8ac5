//! 服务发现配置

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 服务发现配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// 后端类型：consul, memory
    #[serde(default)]
    pub backend: BackendType,

    /// Consul agent 地址
    #[serde(default = "default_consul_url")]
    pub consul_url: String,

    /// Consul ACL token
    #[serde(default)]
    pub token: Option<String>,

    /// 健康检查间隔（秒）
    #[serde(default = "default_check_interval_secs")]
    pub check_interval_secs: u64,

    /// 健康检查持续失败多久后由 Consul 自动注销（秒）
    #[serde(default)]
    pub deregister_critical_after_secs: Option<u64>,

    /// 单次 HTTP 请求超时（秒）
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// 后端池刷新间隔（秒）
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
}

/// 后端类型
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackendType {
    #[default]
    Consul,
    Memory,
}

impl std::str::FromStr for BackendType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "consul" => Ok(BackendType::Consul),
            "memory" | "in-memory" => Ok(BackendType::Memory),
            _ => Err(format!("Unknown backend type: {}", s)),
        }
    }
}

fn default_consul_url() -> String {
    "http://127.0.0.1:8500".to_string()
}

fn default_check_interval_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    5
}

fn default_refresh_interval_secs() -> u64 {
    10
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            backend: BackendType::default(),
            consul_url: default_consul_url(),
            token: None,
            check_interval_secs: default_check_interval_secs(),
            deregister_critical_after_secs: None,
            request_timeout_secs: default_request_timeout_secs(),
            refresh_interval_secs: default_refresh_interval_secs(),
        }
    }
}

impl DiscoveryConfig {
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs.max(1))
    }

    pub fn deregister_critical_after(&self) -> Option<Duration> {
        self.deregister_critical_after_secs.map(Duration::from_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs.max(1))
    }
}
