//! Consul 服务发现后端
//!
//! 使用 Consul agent HTTP API：
//! - `PUT /v1/agent/service/register`
//! - `PUT /v1/agent/service/deregister/<service_id>`
//! - `GET /v1/health/service/<name>?passing=true`

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde_json::{Value, json};
use std::net::{IpAddr, SocketAddr};
use tracing::{debug, warn};

use crate::balancer::Backend;
use crate::discovery::DiscoveryConfig;
use crate::discovery::backend::DiscoveryBackend;
use crate::discovery::registration::RegistrationRecord;
use crate::error::{ErrorCode, FlareError, Result, scope};

const TOKEN_HEADER: &str = "X-Consul-Token";

/// Consul 服务发现后端
pub struct ConsulBackend {
    http_client: HttpClient,
    consul_url: String,
    token: Option<String>,
}

impl ConsulBackend {
    /// 创建新的 Consul 后端
    pub fn new(config: &DiscoveryConfig) -> Result<Self> {
        let http_client = HttpClient::builder()
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            http_client,
            consul_url: config.consul_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        })
    }

    pub fn consul_url(&self) -> &str {
        &self.consul_url
    }

    fn with_token(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.header(TOKEN_HEADER, token),
            None => request,
        }
    }

    /// 非 2xx 响应视为失败，错误信息带上响应体
    async fn ensure_success(
        response: reqwest::Response,
        code: ErrorCode,
        action: &str,
    ) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(FlareError::new(
            code,
            scope::DISCOVERY,
            format!("consul {} failed with status {}: {}", action, status, body.trim()),
        ))
    }

    fn registration_payload(record: &RegistrationRecord) -> Value {
        let mut check = json!({
            "CheckID": record.check.check_id,
            "HTTP": record.check.url,
            "Interval": format!("{}s", record.check.interval.as_secs().max(1)),
        });
        if let Some(after) = record.check.deregister_critical_after {
            check["DeregisterCriticalServiceAfter"] = json!(format!("{}s", after.as_secs()));
        }

        json!({
            "ID": record.service_id,
            "Name": record.name,
            "Tags": record.tags,
            "Address": record.host,
            "Port": record.port,
            "EnableTagOverride": true,
            "Check": check,
        })
    }

    /// 解析 `/v1/health/service` 的一条记录，服务地址为空时使用节点地址
    async fn parse_entry(entry: &Value) -> Option<Backend> {
        let service = entry.get("Service")?;
        let port = service.get("Port").and_then(Value::as_u64)?;
        let port = u16::try_from(port).ok().filter(|p| *p != 0)?;

        let host = service
            .get("Address")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .or_else(|| {
                entry
                    .get("Node")
                    .and_then(|node| node.get("Address"))
                    .and_then(Value::as_str)
            })?;

        let address = match host.parse::<IpAddr>() {
            Ok(ip) => SocketAddr::new(ip, port),
            Err(_) => tokio::net::lookup_host((host, port)).await.ok()?.next()?,
        };

        let weight = service
            .get("Weights")
            .and_then(|w| w.get("Passing"))
            .and_then(Value::as_u64)
            .and_then(|w| u32::try_from(w).ok())
            .unwrap_or(1);

        Some(Backend::new(address).with_weight(weight))
    }
}

#[async_trait]
impl DiscoveryBackend for ConsulBackend {
    async fn register_service(&self, record: &RegistrationRecord) -> Result<()> {
        let url = format!("{}/v1/agent/service/register", self.consul_url);
        let payload = Self::registration_payload(record);
        debug!(service_id = %record.service_id, url = %url, "Registering service with consul");

        let response = self
            .with_token(self.http_client.put(&url))
            .json(&payload)
            .send()
            .await?;
        Self::ensure_success(response, ErrorCode::RegistrationFailed, "register").await?;
        Ok(())
    }

    async fn deregister_service(&self, service_id: &str) -> Result<()> {
        let url = format!("{}/v1/agent/service/deregister/{}", self.consul_url, service_id);
        let response = self.with_token(self.http_client.put(&url)).send().await?;
        Self::ensure_success(response, ErrorCode::DeregistrationFailed, "deregister").await?;
        Ok(())
    }

    async fn discover(&self, service_name: &str) -> Result<Vec<Backend>> {
        let url = format!("{}/v1/health/service/{}", self.consul_url, service_name);
        let response = self
            .with_token(self.http_client.get(&url))
            .query(&[("passing", "true")])
            .send()
            .await?;
        let response =
            Self::ensure_success(response, ErrorCode::DiscoveryUnavailable, "health query").await?;
        let entries: Vec<Value> = response.json().await?;

        let mut backends = Vec::with_capacity(entries.len());
        for entry in &entries {
            match Self::parse_entry(entry).await {
                Some(backend) => backends.push(backend),
                None => warn!(service = %service_name, "Skipping consul entry without usable address"),
            }
        }
        Ok(backends)
    }
}
