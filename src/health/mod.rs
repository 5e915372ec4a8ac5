//! 健康检查模块
//!
//! 服务发现通过 `GET /health` 探测实例状态：SERVING 返回 200，其他返回 503。

use axum::http::StatusCode;
use axum::response::IntoResponse;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::server::{Handler, handler_fn};

/// 健康状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Unknown,
    Serving,
    NotServing,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Unknown => "UNKNOWN",
            HealthStatus::Serving => "SERVING",
            HealthStatus::NotServing => "NOT_SERVING",
        }
    }
}

/// 健康检查服务
#[derive(Debug, Clone, Default)]
pub struct HealthService {
    statuses: Arc<RwLock<HashMap<String, HealthStatus>>>,
}

impl HealthService {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_status(&self, service: impl Into<String>, status: HealthStatus) {
        let mut statuses = self.statuses.write().await;
        statuses.insert(service.into(), status);
    }

    pub async fn get_status(&self, service: &str) -> HealthStatus {
        let statuses = self.statuses.read().await;
        statuses
            .get(service)
            .copied()
            .unwrap_or(HealthStatus::Unknown)
    }

    pub async fn set_serving(&self) {
        let mut statuses = self.statuses.write().await;
        for status in statuses.values_mut() {
            *status = HealthStatus::Serving;
        }
    }

    pub async fn set_not_serving(&self) {
        let mut statuses = self.statuses.write().await;
        for status in statuses.values_mut() {
            *status = HealthStatus::NotServing;
        }
    }

    /// 整体状态：全部 SERVING 才是 SERVING，没有登记任何服务时为 UNKNOWN
    pub async fn overall(&self) -> HealthStatus {
        let statuses = self.statuses.read().await;
        if statuses.is_empty() {
            HealthStatus::Unknown
        } else if statuses.values().all(|s| *s == HealthStatus::Serving) {
            HealthStatus::Serving
        } else {
            HealthStatus::NotServing
        }
    }

    /// `GET /health` 处理函数
    pub fn handler(&self) -> Handler {
        let health = self.clone();
        handler_fn(move |_| {
            let health = health.clone();
            async move {
                let status = health.overall().await;
                let code = if status == HealthStatus::Serving {
                    StatusCode::OK
                } else {
                    StatusCode::SERVICE_UNAVAILABLE
                };
                (code, status.as_str()).into_response()
            }
        })
    }
}
