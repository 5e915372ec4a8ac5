//! 服务发现工厂
//!
//! 按配置构建后端、注册器和后端池刷新任务

use std::sync::Arc;
use tracing::info;

use crate::balancer::BackendPool;
use crate::discovery::backend::{ConsulBackend, DiscoveryBackend, InMemoryBackend};
use crate::discovery::{BackendType, DiscoveryConfig, PoolRefresher, ServiceRegistrar};
use crate::error::Result;

/// 服务发现工厂
pub struct DiscoveryFactory;

impl DiscoveryFactory {
    /// 从配置创建服务发现后端
    pub fn create_backend(config: &DiscoveryConfig) -> Result<Arc<dyn DiscoveryBackend>> {
        match config.backend {
            BackendType::Consul => {
                let backend = ConsulBackend::new(config)?;
                info!(consul_url = %backend.consul_url(), "Using consul discovery backend");
                Ok(Arc::new(backend))
            }
            BackendType::Memory => {
                info!("Using in-memory discovery backend");
                Ok(Arc::new(InMemoryBackend::new()))
            }
        }
    }

    /// 从配置创建注册器
    pub fn create_registrar(config: &DiscoveryConfig) -> Result<ServiceRegistrar> {
        let backend = Self::create_backend(config)?;
        Ok(ServiceRegistrar::with_config(backend, config))
    }

    /// 创建刷新 `services` 的后端池刷新任务
    pub fn create_refresher<I, S>(
        config: &DiscoveryConfig,
        pool: BackendPool,
        services: I,
    ) -> Result<PoolRefresher>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let backend = Self::create_backend(config)?;
        let refresher = services
            .into_iter()
            .fold(PoolRefresher::new(backend, pool, config.refresh_interval()), |r, name| {
                r.watch(name)
            });
        Ok(refresher)
    }
}
