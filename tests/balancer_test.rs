//! 负载均衡与后端池刷新测试

use flare_service_boot::balancer::{Backend, BackendPool, Balancer, LoadBalanceStrategy, LoadBalancer};
use flare_service_boot::discovery::{DiscoveryBackend, InMemoryBackend, PoolRefresher, RegistrationRecord};
use flare_service_boot::error::ErrorCode;
use flare_service_boot::types::ServiceInfo;
use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn addr(port: u16) -> SocketAddr {
    SocketAddr::from(([10, 0, 0, 1], port))
}

fn record(name: &str, address: &str) -> RegistrationRecord {
    RegistrationRecord::build(&ServiceInfo::new(name, 8080), address, Duration::from_secs(10), None)
        .expect("record")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_selects_only_return_pool_members() {
    let pool = BackendPool::new();
    pool.set_addresses("user", [addr(1), addr(2)]);
    let balancer = Arc::new(LoadBalancer::random(pool));

    let mut handles = Vec::with_capacity(1000);
    for _ in 0..1000 {
        let balancer = balancer.clone();
        handles.push(tokio::spawn(async move { balancer.select("user") }));
    }

    let mut seen = HashSet::new();
    for handle in handles {
        let picked = handle.await.expect("join").expect("backend");
        assert!(picked == addr(1) || picked == addr(2));
        seen.insert(picked);
    }
    assert_eq!(seen.len(), 2, "random strategy should eventually pick both backends");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn selects_stay_valid_while_pool_is_replaced() {
    let pool = BackendPool::new();
    pool.set_addresses("user", [addr(1), addr(2)]);
    let balancer = Arc::new(LoadBalancer::new(pool.clone(), LoadBalanceStrategy::RoundRobin));

    let writer = {
        let pool = pool.clone();
        tokio::spawn(async move {
            for i in 0..200u16 {
                if i % 2 == 0 {
                    pool.set_addresses("user", [addr(3)]);
                } else {
                    pool.set_addresses("user", [addr(1), addr(2)]);
                }
                tokio::task::yield_now().await;
            }
        })
    };

    let mut readers = Vec::new();
    for _ in 0..8 {
        let balancer = balancer.clone();
        readers.push(tokio::spawn(async move {
            for _ in 0..200 {
                let picked = balancer.select("user").expect("pool never empty");
                assert!([addr(1), addr(2), addr(3)].contains(&picked));
                tokio::task::yield_now().await;
            }
        }));
    }

    writer.await.expect("writer");
    for reader in readers {
        reader.await.expect("reader");
    }
}

#[test]
fn empty_pool_fails_fast() {
    let pool = BackendPool::new();
    pool.set_addresses("user", Vec::new());
    let balancer = LoadBalancer::random(pool);

    let err = balancer.select("user").unwrap_err();
    assert!(err.is(ErrorCode::NoBackendAvailable));
    assert_eq!(balancer.candidate_count("user"), 0);
}

#[tokio::test]
async fn refresher_replaces_pool_and_keeps_snapshot_on_error() {
    let backend = Arc::new(InMemoryBackend::new());
    backend.register_service(&record("user", "127.0.0.1:9001")).await.expect("register");
    backend.register_service(&record("user", "127.0.0.1:9002")).await.expect("register");

    let pool = BackendPool::new();
    let refresher = PoolRefresher::new(backend.clone(), pool.clone(), Duration::from_secs(60)).watch("user");

    assert_eq!(refresher.refresh_once().await, 1);
    assert_eq!(pool.len("user"), 2);

    backend.set_unavailable(true);
    assert_eq!(refresher.refresh_once().await, 0);
    assert_eq!(pool.len("user"), 2, "failed refresh must keep the previous snapshot");

    backend.set_unavailable(false);
    backend.deregister_service("user-127.0.0.1:9001").await.expect("deregister");
    refresher.refresh_once().await;
    assert_eq!(
        pool.snapshot("user").as_ref(),
        &[Backend::new("127.0.0.1:9002".parse().expect("addr"))]
    );
}

#[tokio::test]
async fn spawned_refresher_stops_on_cancel() {
    let backend = Arc::new(InMemoryBackend::new());
    backend.register_service(&record("user", "127.0.0.1:9001")).await.expect("register");

    let pool = BackendPool::new();
    let cancel = CancellationToken::new();
    let handle = PoolRefresher::new(backend, pool.clone(), Duration::from_millis(20))
        .watch("user")
        .spawn(cancel.clone());

    for _ in 0..50 {
        if pool.len("user") == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(pool.len("user"), 1);

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("refresher exits")
        .expect("join");
}
