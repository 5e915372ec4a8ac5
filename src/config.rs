//! 配置加载
//!
//! 配置文件为 TOML 格式：
//!
//! ```toml
//! [service]
//! name = "user-service"
//! version = "1.0.0"
//! port = 8080
//! tag = "prod"
//! dev_mode = false
//!
//! [server]
//! bind_host = "0.0.0.0"
//! advertise_host = "10.0.0.12"
//!
//! [discovery]
//! consul_url = "http://127.0.0.1:8500"
//! check_interval_secs = 10
//!
//! [client]
//! connect_timeout_ms = 3000
//!
//! [log]
//! level = "info"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::client::DialerConfig;
use crate::discovery::DiscoveryConfig;
use crate::error::{ErrorCode, FlareError, Result, scope};
use crate::logging::LogConfig;
use crate::types::ServiceInfo;

/// 指定配置文件路径的环境变量
pub const CONFIG_PATH_ENV: &str = "FLARE_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub service: Option<ServiceInfo>,
    #[serde(default)]
    pub server: ServerConfig,
    pub discovery: Option<DiscoveryConfig>,
    #[serde(default)]
    pub client: DialerConfig,
    #[serde(default)]
    pub log: LogConfig,
}

impl Config {
    pub fn new(service: ServiceInfo) -> Self {
        Self {
            service: Some(service),
            server: ServerConfig::default(),
            discovery: None,
            client: DialerConfig::default(),
            log: LogConfig::default(),
        }
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            FlareError::configuration(
                scope::CONFIG,
                format!("failed to read config file {}: {}", path.display(), e),
            )
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// 服务身份配置，缺失时为配置错误
    pub fn service_info(&self) -> Result<&ServiceInfo> {
        self.service.as_ref().ok_or_else(|| {
            FlareError::new(ErrorCode::MissingServiceInfo, scope::CONFIG, "没有指定 ServiceInfo")
        })
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// 监听地址
    #[serde(default = "default_bind_host")]
    pub bind_host: String,
    /// 注册到服务发现的地址，未设置时使用本机 IP
    #[serde(default)]
    pub advertise_host: Option<String>,
}

fn default_bind_host() -> String {
    "0.0.0.0".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_host: default_bind_host(),
            advertise_host: None,
        }
    }
}

/// 加载后的配置及其来源
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: Config,
    pub path: Option<PathBuf>,
}

/// 配置加载器
pub trait ConfigLoader: Send + Sync {
    fn load(&self) -> Result<LoadedConfig>;
}

/// 从 TOML 文件加载配置
pub struct TomlFileLoader {
    path: PathBuf,
}

impl TomlFileLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// 路径取自 `FLARE_CONFIG`，未设置时为 `config.toml`
    pub fn from_env() -> Self {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::new(path)
    }
}

impl ConfigLoader for TomlFileLoader {
    fn load(&self) -> Result<LoadedConfig> {
        let config = Config::load_from_file(&self.path)?;
        Ok(LoadedConfig {
            config,
            path: Some(self.path.clone()),
        })
    }
}

/// 直接使用内存中的配置
pub struct StaticConfig(pub Config);

impl ConfigLoader for StaticConfig {
    fn load(&self) -> Result<LoadedConfig> {
        Ok(LoadedConfig {
            config: self.0.clone(),
            path: None,
        })
    }
}
