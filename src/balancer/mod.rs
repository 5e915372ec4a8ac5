//! 负载均衡模块
//!
//! 从逻辑服务名的健康后端中选择一个实例。选择是同步且非阻塞的，
//! 可以被任意数量的并发调用方同时使用。

mod load_balancer;
pub mod pool;

pub use load_balancer::{LoadBalanceStrategy, LoadBalancer};
pub use pool::{Backend, BackendPool};

use std::net::SocketAddr;
use std::sync::Arc;

use crate::error::Result;

/// 负载均衡器
pub trait Balancer: Send + Sync {
    /// 为逻辑服务名选择一个后端，没有可用实例时立即返回错误
    fn select(&self, service_name: &str) -> Result<SocketAddr> {
        self.select_excluding(service_name, &[])
    }

    /// 选择一个不在 `excluded` 中的后端
    fn select_excluding(&self, service_name: &str, excluded: &[SocketAddr]) -> Result<SocketAddr>;

    /// 当前候选实例数
    fn candidate_count(&self, service_name: &str) -> usize;

    /// 到 `address` 的连接已建立
    fn connection_opened(&self, _address: SocketAddr) {}

    /// 到 `address` 的连接已关闭
    fn connection_closed(&self, _address: SocketAddr) {}
}

/// 连接存活期间占用一个计数，drop 时归还
pub struct ConnectionGuard {
    balancer: Arc<dyn Balancer>,
    address: SocketAddr,
}

impl ConnectionGuard {
    pub fn new(balancer: Arc<dyn Balancer>, address: SocketAddr) -> Self {
        balancer.connection_opened(address);
        Self { balancer, address }
    }

    pub fn address(&self) -> SocketAddr {
        self.address
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.balancer.connection_closed(self.address);
    }
}

impl std::fmt::Debug for ConnectionGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionGuard")
            .field("address", &self.address)
            .finish()
    }
}
