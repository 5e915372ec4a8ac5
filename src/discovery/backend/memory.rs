//! 进程内服务发现后端
//!
//! 用于本地开发和测试，不做健康检查：已注册的实例都视为健康。

use async_trait::async_trait;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

use crate::balancer::Backend;
use crate::discovery::backend::DiscoveryBackend;
use crate::discovery::registration::RegistrationRecord;
use crate::error::{ErrorCode, FlareError, Result, scope};

#[derive(Default)]
pub struct InMemoryBackend {
    records: RwLock<HashMap<String, RegistrationRecord>>,
    unavailable: AtomicBool,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// 模拟后端不可用，之后的所有调用都返回错误
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// 当前所有注册记录，按 service_id 排序
    pub async fn records(&self) -> Vec<RegistrationRecord> {
        let records = self.records.read().await;
        let mut list: Vec<RegistrationRecord> = records.values().cloned().collect();
        list.sort_by(|a, b| a.service_id.cmp(&b.service_id));
        list
    }

    pub async fn get(&self, service_id: &str) -> Option<RegistrationRecord> {
        self.records.read().await.get(service_id).cloned()
    }

    fn check_available(&self, code: ErrorCode) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(FlareError::new(code, scope::DISCOVERY, "in-memory backend unavailable"));
        }
        Ok(())
    }
}

#[async_trait]
impl DiscoveryBackend for InMemoryBackend {
    async fn register_service(&self, record: &RegistrationRecord) -> Result<()> {
        self.check_available(ErrorCode::RegistrationFailed)?;
        let mut records = self.records.write().await;
        records.insert(record.service_id.clone(), record.clone());
        Ok(())
    }

    async fn deregister_service(&self, service_id: &str) -> Result<()> {
        self.check_available(ErrorCode::DeregistrationFailed)?;
        self.records.write().await.remove(service_id);
        Ok(())
    }

    async fn discover(&self, service_name: &str) -> Result<Vec<Backend>> {
        self.check_available(ErrorCode::DiscoveryUnavailable)?;
        let records = self.records.read().await;
        let mut backends: Vec<Backend> = records
            .values()
            .filter(|record| record.name == service_name)
            .filter_map(|record| record.address().parse::<SocketAddr>().ok())
            .map(Backend::new)
            .collect();
        backends.sort_by_key(|backend| backend.address);
        Ok(backends)
    }
}
