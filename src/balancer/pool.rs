//! 后端地址池
//!
//! 每个逻辑服务名对应一份不可变快照。刷新时整体替换快照，读者只在克隆 `Arc`
//! 的瞬间持有读锁，选择过程不受并发刷新影响。

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::{Arc, PoisonError, RwLock};

/// 一个可拨号的后端实例
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Backend {
    pub address: SocketAddr,
    /// 加权随机策略使用的权重，最小为 1
    pub weight: u32,
}

impl Backend {
    pub fn new(address: SocketAddr) -> Self {
        Self { address, weight: 1 }
    }

    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = weight.max(1);
        self
    }
}

impl From<SocketAddr> for Backend {
    fn from(address: SocketAddr) -> Self {
        Self::new(address)
    }
}

type Snapshot = Arc<[Backend]>;

/// 按服务名组织的后端池，可在多个均衡器和刷新任务之间共享
#[derive(Debug, Clone, Default)]
pub struct BackendPool {
    services: Arc<RwLock<HashMap<String, Snapshot>>>,
}

impl BackendPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// 替换服务的后端列表，重复地址只保留第一次出现
    pub fn update(&self, service_name: &str, backends: impl IntoIterator<Item = Backend>) {
        let mut seen = HashSet::new();
        let snapshot: Snapshot = backends
            .into_iter()
            .filter(|backend| seen.insert(backend.address))
            .map(|backend| backend.with_weight(backend.weight))
            .collect();

        let mut services = self.services.write().unwrap_or_else(PoisonError::into_inner);
        services.insert(service_name.to_string(), snapshot);
    }

    /// 以等权重替换服务的地址列表
    pub fn set_addresses(&self, service_name: &str, addresses: impl IntoIterator<Item = SocketAddr>) {
        self.update(service_name, addresses.into_iter().map(Backend::new));
    }

    pub fn remove(&self, service_name: &str) {
        let mut services = self.services.write().unwrap_or_else(PoisonError::into_inner);
        services.remove(service_name);
    }

    /// 当前快照，未知服务返回空切片
    pub fn snapshot(&self, service_name: &str) -> Snapshot {
        let services = self.services.read().unwrap_or_else(PoisonError::into_inner);
        services
            .get(service_name)
            .cloned()
            .unwrap_or_else(|| Arc::from(Vec::new()))
    }

    pub fn len(&self, service_name: &str) -> usize {
        self.snapshot(service_name).len()
    }

    pub fn is_empty(&self, service_name: &str) -> bool {
        self.len(service_name) == 0
    }

    pub fn service_names(&self) -> Vec<String> {
        let services = self.services.read().unwrap_or_else(PoisonError::into_inner);
        services.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    #[test]
    fn update_replaces_snapshot_and_dedups() {
        let pool = BackendPool::new();
        pool.set_addresses("user", [addr(1), addr(2), addr(1)]);
        let old = pool.snapshot("user");
        assert_eq!(old.len(), 2);

        pool.set_addresses("user", [addr(3)]);
        assert_eq!(pool.snapshot("user").as_ref(), &[Backend::new(addr(3))]);
        // 旧快照不受替换影响
        assert_eq!(old.len(), 2);
    }

    #[test]
    fn unknown_service_is_empty() {
        let pool = BackendPool::new();
        assert!(pool.is_empty("missing"));
        assert!(pool.service_names().is_empty());
    }

    #[test]
    fn zero_weight_is_raised_to_one() {
        let pool = BackendPool::new();
        pool.update("user", [Backend { address: addr(1), weight: 0 }]);
        assert_eq!(pool.snapshot("user")[0].weight, 1);
    }
}
