//! 负载均衡策略实现

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use super::{Backend, BackendPool, Balancer};
use crate::error::{FlareError, Result, scope};

/// 负载均衡策略
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadBalanceStrategy {
    /// 随机（Random）
    #[default]
    Random,
    /// 轮询（Round Robin）
    RoundRobin,
    /// 最少连接（Least Connections），依赖连接计数
    LeastConnections,
    /// 按权重随机
    WeightedRandom,
}

/// 基于 [`BackendPool`] 的负载均衡器
pub struct LoadBalancer {
    pool: BackendPool,
    strategy: LoadBalanceStrategy,
    round_robin_index: AtomicUsize,
    connection_counts: Mutex<HashMap<SocketAddr, usize>>,
}

impl LoadBalancer {
    pub fn new(pool: BackendPool, strategy: LoadBalanceStrategy) -> Self {
        Self {
            pool,
            strategy,
            round_robin_index: AtomicUsize::new(0),
            connection_counts: Mutex::new(HashMap::new()),
        }
    }

    /// 随机策略
    pub fn random(pool: BackendPool) -> Self {
        Self::new(pool, LoadBalanceStrategy::Random)
    }

    pub fn pool(&self) -> &BackendPool {
        &self.pool
    }

    pub fn strategy(&self) -> LoadBalanceStrategy {
        self.strategy
    }

    /// 当前到 `address` 的活跃连接数
    pub fn connection_count(&self, address: SocketAddr) -> usize {
        let counts = self.connection_counts.lock().unwrap_or_else(PoisonError::into_inner);
        counts.get(&address).copied().unwrap_or(0)
    }

    fn select_random(&self, candidates: &[&Backend]) -> SocketAddr {
        let index = rand::thread_rng().gen_range(0..candidates.len());
        candidates[index].address
    }

    fn select_round_robin(&self, candidates: &[&Backend]) -> SocketAddr {
        let index = self.round_robin_index.fetch_add(1, Ordering::Relaxed);
        candidates[index % candidates.len()].address
    }

    fn select_least_connections(&self, candidates: &[&Backend]) -> SocketAddr {
        let counts = self.connection_counts.lock().unwrap_or_else(PoisonError::into_inner);
        let least = candidates
            .iter()
            .map(|backend| counts.get(&backend.address).copied().unwrap_or(0))
            .min()
            .unwrap_or(0);
        let tied: Vec<&Backend> = candidates
            .iter()
            .copied()
            .filter(|backend| counts.get(&backend.address).copied().unwrap_or(0) == least)
            .collect();
        drop(counts);
        self.select_random(&tied)
    }

    fn select_weighted_random(&self, candidates: &[&Backend]) -> SocketAddr {
        let total: u64 = candidates.iter().map(|backend| u64::from(backend.weight)).sum();
        let mut point = rand::thread_rng().gen_range(0..total.max(1));
        for backend in candidates {
            let weight = u64::from(backend.weight);
            if point < weight {
                return backend.address;
            }
            point -= weight;
        }
        candidates[candidates.len() - 1].address
    }
}

impl Balancer for LoadBalancer {
    fn select_excluding(&self, service_name: &str, excluded: &[SocketAddr]) -> Result<SocketAddr> {
        let snapshot = self.pool.snapshot(service_name);
        let candidates: Vec<&Backend> = snapshot
            .iter()
            .filter(|backend| !excluded.contains(&backend.address))
            .collect();

        if candidates.is_empty() {
            return Err(FlareError::no_backend(scope::BALANCER, service_name));
        }

        let address = match self.strategy {
            LoadBalanceStrategy::Random => self.select_random(&candidates),
            LoadBalanceStrategy::RoundRobin => self.select_round_robin(&candidates),
            LoadBalanceStrategy::LeastConnections => self.select_least_connections(&candidates),
            LoadBalanceStrategy::WeightedRandom => self.select_weighted_random(&candidates),
        };
        Ok(address)
    }

    fn candidate_count(&self, service_name: &str) -> usize {
        self.pool.len(service_name)
    }

    fn connection_opened(&self, address: SocketAddr) {
        let mut counts = self.connection_counts.lock().unwrap_or_else(PoisonError::into_inner);
        *counts.entry(address).or_insert(0) += 1;
    }

    fn connection_closed(&self, address: SocketAddr) {
        let mut counts = self.connection_counts.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(count) = counts.get_mut(&address) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                counts.remove(&address);
            }
        }
    }
}

impl std::fmt::Debug for LoadBalancer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadBalancer")
            .field("strategy", &self.strategy)
            .field("services", &self.pool.service_names())
            .finish()
    }
}
