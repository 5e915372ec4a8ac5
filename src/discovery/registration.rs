//! 注册记录
//!
//! 一个服务实例在服务发现中的身份：实例 ID、健康检查 ID、对外地址和健康检查定义。

use serde::Serialize;
use std::time::Duration;

use crate::error::{FlareError, Result, scope};
use crate::types::ServiceInfo;
use crate::utils::split_host_port;

/// 健康检查路径
pub const HEALTH_PATH: &str = "/health";

/// 实例 ID：`<name>-<address>`
///
/// 同名同地址的两次注册得到相同的 ID，后一次覆盖前一次。
pub fn service_id(name: &str, address: &str) -> String {
    format!("{}-{}", name, address)
}

/// 健康检查 ID：`service:<service_id>`
pub fn check_id(service_id: &str) -> String {
    format!("service:{}", service_id)
}

/// HTTP 健康检查定义
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub check_id: String,
    /// 探测地址，如 `http://10.0.0.12:8080/health`
    pub url: String,
    pub interval: Duration,
    pub deregister_critical_after: Option<Duration>,
}

/// 提交给服务发现后端的注册记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistrationRecord {
    pub service_id: String,
    pub name: String,
    pub tags: Vec<String>,
    pub host: String,
    pub port: u16,
    pub check: HealthCheck,
}

impl RegistrationRecord {
    /// 由服务信息和对外地址 `host:port` 构建注册记录
    pub fn build(
        info: &ServiceInfo,
        address: &str,
        check_interval: Duration,
        deregister_critical_after: Option<Duration>,
    ) -> Result<Self> {
        if info.name.trim().is_empty() {
            return Err(FlareError::configuration(scope::REGISTRAR, "service name is empty"));
        }
        let (host, port) = split_host_port(address)?;
        if host.is_empty() {
            return Err(FlareError::invalid_address(
                scope::REGISTRAR,
                format!("address '{}' has no host", address),
            ));
        }

        let service_id = service_id(&info.name, address);
        let check = HealthCheck {
            check_id: check_id(&service_id),
            url: format!("{}://{}{}", info.scheme.as_str(), address, HEALTH_PATH),
            interval: check_interval,
            deregister_critical_after,
        };
        let tags = if info.tag.is_empty() {
            Vec::new()
        } else {
            vec![info.tag.clone()]
        };

        Ok(Self {
            service_id,
            name: info.name.clone(),
            tags,
            host,
            port,
            check,
        })
    }

    /// `host:port`
    pub fn address(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}
