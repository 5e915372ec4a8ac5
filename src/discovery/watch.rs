//! 后端池刷新
//!
//! 周期性地从服务发现查询健康实例并整体替换 [`BackendPool`] 中的快照。
//! 查询失败时保留上一次的快照。

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::balancer::BackendPool;
use crate::discovery::backend::DiscoveryBackend;

pub struct PoolRefresher {
    backend: Arc<dyn DiscoveryBackend>,
    pool: BackendPool,
    services: Vec<String>,
    interval: Duration,
}

impl PoolRefresher {
    pub fn new(backend: Arc<dyn DiscoveryBackend>, pool: BackendPool, interval: Duration) -> Self {
        Self {
            backend,
            pool,
            services: Vec::new(),
            interval,
        }
    }

    /// 增加一个需要刷新的服务名
    pub fn watch(mut self, service_name: impl Into<String>) -> Self {
        let name = service_name.into();
        if !self.services.contains(&name) {
            self.services.push(name);
        }
        self
    }

    /// 刷新一次所有服务，返回刷新成功的服务数
    pub async fn refresh_once(&self) -> usize {
        let mut refreshed = 0;
        for name in &self.services {
            match self.backend.discover(name).await {
                Ok(backends) => {
                    debug!(service = %name, count = backends.len(), "Backend pool refreshed");
                    self.pool.update(name, backends);
                    refreshed += 1;
                }
                Err(e) => {
                    warn!(service = %name, error = %e, "Discovery query failed, keeping previous pool");
                }
            }
        }
        refreshed
    }

    /// 在后台运行，直到 `cancel` 被取消
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(services = ?self.services, interval = ?self.interval, "Pool refresher started");

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        self.refresh_once().await;
                    }
                }
            }
            info!("Pool refresher stopped");
        })
    }
}
