//! 服务注册器测试
//!
//! Consul 部分使用本地 axum 模拟 agent API，不需要真实的 Consul。

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, put};
use axum::{Json, Router};
use flare_service_boot::balancer::BackendPool;
use flare_service_boot::discovery::{
    ConsulBackend, DiscoveryBackend, DiscoveryConfig, DiscoveryFactory, InMemoryBackend,
    RegistrationState, ServiceRegistrar,
};
use flare_service_boot::error::{ErrorCode, scope};
use flare_service_boot::types::ServiceInfo;
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio_test::{assert_err, assert_ok};
use tokio_util::sync::CancellationToken;

#[derive(Clone, Default)]
struct FakeConsul {
    registered: Arc<Mutex<Vec<Value>>>,
    deregistered: Arc<Mutex<Vec<String>>>,
    reject: bool,
}

async fn register(State(consul): State<FakeConsul>, Json(payload): Json<Value>) -> StatusCode {
    if consul.reject {
        return StatusCode::INTERNAL_SERVER_ERROR;
    }
    consul.registered.lock().expect("lock").push(payload);
    StatusCode::OK
}

async fn deregister(State(consul): State<FakeConsul>, Path(id): Path<String>) -> StatusCode {
    consul.deregistered.lock().expect("lock").push(id);
    StatusCode::OK
}

async fn health(Path(name): Path<String>) -> Json<Value> {
    if name != "user" {
        return Json(json!([]));
    }
    Json(json!([
        { "Node": { "Address": "10.0.0.5" }, "Service": { "Address": "10.0.0.12", "Port": 8080 } },
        { "Node": { "Address": "10.0.0.6" }, "Service": { "Address": "", "Port": 8081 } }
    ]))
}

async fn start_fake_consul(consul: FakeConsul) -> SocketAddr {
    let app = Router::new()
        .route("/v1/agent/service/register", put(register))
        .route("/v1/agent/service/deregister/{id}", put(deregister))
        .route("/v1/health/service/{name}", get(health))
        .with_state(consul);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let address = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    address
}

fn consul_config(address: SocketAddr) -> DiscoveryConfig {
    DiscoveryConfig {
        consul_url: format!("http://{}", address),
        ..DiscoveryConfig::default()
    }
}

#[tokio::test]
async fn register_is_idempotent_for_same_address() {
    let backend = Arc::new(InMemoryBackend::new());
    let registrar = ServiceRegistrar::new(backend.clone());
    let info = ServiceInfo::new("user", 8080);
    let cancel = CancellationToken::new();

    assert_ok!(registrar.register(&info, "127.0.0.1:8080", &cancel).await);
    assert_ok!(registrar.register(&info, "127.0.0.1:8080", &cancel).await);
    assert_eq!(registrar.state(), RegistrationState::Registered);

    let records = backend.records().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].service_id, "user-127.0.0.1:8080");
    assert_eq!(records[0].check.check_id, "service:user-127.0.0.1:8080");
    assert_eq!(records[0].check.url, "http://127.0.0.1:8080/health");
    assert_eq!(records[0].check.interval.as_secs(), 10);
}

#[tokio::test]
async fn register_at_new_address_replaces_previous_record() {
    let backend = Arc::new(InMemoryBackend::new());
    let registrar = ServiceRegistrar::new(backend.clone());
    let info = ServiceInfo::new("user", 8080);
    let cancel = CancellationToken::new();

    assert_ok!(registrar.register(&info, "127.0.0.1:8080", &cancel).await);
    assert_ok!(registrar.register(&info, "127.0.0.1:9090", &cancel).await);
    assert_eq!(registrar.service_id().as_deref(), Some("user-127.0.0.1:9090"));

    let ids: Vec<String> = backend.records().await.into_iter().map(|r| r.service_id).collect();
    assert_eq!(ids, vec!["user-127.0.0.1:9090".to_string()]);

    assert_ok!(registrar.deregister().await);
    assert!(backend.records().await.is_empty());
}

#[tokio::test]
async fn invalid_address_keeps_its_origin_scope() {
    let registrar = ServiceRegistrar::new(Arc::new(InMemoryBackend::new()));
    let err = registrar
        .register(&ServiceInfo::new("user", 8080), "127.0.0.1", &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(err.is(ErrorCode::InvalidAddress));
    assert_ne!(err.scope(), scope::REGISTRAR);
}

#[tokio::test]
async fn failed_registration_leaves_state_untouched() {
    let backend = Arc::new(InMemoryBackend::new());
    backend.set_unavailable(true);
    let registrar = ServiceRegistrar::new(backend.clone());

    let err = registrar
        .register(&ServiceInfo::new("user", 8080), "127.0.0.1:8080", &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(err.is(ErrorCode::RegistrationFailed));
    assert_eq!(registrar.state(), RegistrationState::Unregistered);
    assert!(registrar.record().is_none());
}

#[tokio::test]
async fn invalid_input_is_rejected_before_backend_call() {
    let backend = Arc::new(InMemoryBackend::new());
    let registrar = ServiceRegistrar::new(backend.clone());
    let cancel = CancellationToken::new();

    let err = assert_err!(
        registrar
            .register(&ServiceInfo::new("user", 8080), "not-an-address", &cancel)
            .await
    );
    assert!(err.is(ErrorCode::InvalidAddress));

    let err = assert_err!(
        registrar
            .register(&ServiceInfo::new("", 8080), "127.0.0.1:8080", &cancel)
            .await
    );
    assert!(err.is(ErrorCode::ConfigurationError));
    assert!(backend.records().await.is_empty());
}

#[tokio::test]
async fn deregister_without_registration_is_noop() {
    let backend = Arc::new(InMemoryBackend::new());
    backend.set_unavailable(true);
    let registrar = ServiceRegistrar::new(backend);

    assert_ok!(registrar.deregister().await);
    assert_eq!(registrar.state(), RegistrationState::Unregistered);
}

#[tokio::test]
async fn deregister_removes_record() {
    let backend = Arc::new(InMemoryBackend::new());
    let registrar = ServiceRegistrar::new(backend.clone());

    assert_ok!(
        registrar
            .register(&ServiceInfo::new("user", 8080), "127.0.0.1:8080", &CancellationToken::new())
            .await
    );
    assert_ok!(registrar.deregister().await);
    assert_eq!(registrar.state(), RegistrationState::Unregistered);
    assert!(backend.records().await.is_empty());
}

#[tokio::test]
async fn cancelled_registration_is_reported() {
    let registrar = ServiceRegistrar::new(Arc::new(InMemoryBackend::new()));
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = registrar
        .register(&ServiceInfo::new("user", 8080), "127.0.0.1:8080", &cancel)
        .await
        .unwrap_err();
    assert!(err.is(ErrorCode::Cancelled));
    assert_eq!(registrar.state(), RegistrationState::Unregistered);
}

#[tokio::test]
async fn consul_backend_speaks_agent_api() {
    let consul = FakeConsul::default();
    let address = start_fake_consul(consul.clone()).await;
    let backend = Arc::new(ConsulBackend::new(&consul_config(address)).expect("backend"));
    let registrar = ServiceRegistrar::new(backend.clone());

    let info = ServiceInfo::new("user", 8080).with_tag("prod");
    assert_ok!(registrar.register(&info, "10.0.0.12:8080", &CancellationToken::new()).await);

    {
        let registered = consul.registered.lock().expect("lock");
        assert_eq!(registered.len(), 1);
        let payload = &registered[0];
        assert_eq!(payload["ID"], "user-10.0.0.12:8080");
        assert_eq!(payload["Name"], "user");
        assert_eq!(payload["Address"], "10.0.0.12");
        assert_eq!(payload["Port"], 8080);
        assert_eq!(payload["Tags"], json!(["prod"]));
        assert_eq!(payload["Check"]["HTTP"], "http://10.0.0.12:8080/health");
        assert_eq!(payload["Check"]["Interval"], "10s");
        assert_eq!(payload["EnableTagOverride"], true);
    }

    let backends = backend.discover("user").await.expect("discover");
    let addresses: Vec<String> = backends.iter().map(|b| b.address.to_string()).collect();
    assert_eq!(addresses, vec!["10.0.0.12:8080", "10.0.0.6:8081"]);
    assert!(backend.discover("order").await.expect("discover").is_empty());

    assert_ok!(registrar.deregister().await);
    assert_eq!(
        *consul.deregistered.lock().expect("lock"),
        vec!["user-10.0.0.12:8080".to_string()]
    );
}

#[tokio::test]
async fn consul_rejection_is_registration_failure() {
    let consul = FakeConsul {
        reject: true,
        ..FakeConsul::default()
    };
    let address = start_fake_consul(consul).await;
    let backend = Arc::new(ConsulBackend::new(&consul_config(address)).expect("backend"));
    let registrar = ServiceRegistrar::new(backend);

    let err = registrar
        .register(&ServiceInfo::new("user", 8080), "10.0.0.12:8080", &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(err.is(ErrorCode::RegistrationFailed));
    assert!(err.message().contains("500"), "{}", err);
    assert_eq!(registrar.state(), RegistrationState::Unregistered);
}

#[tokio::test]
async fn unreachable_consul_is_registration_failure() {
    let closed = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let address = closed.local_addr().expect("addr");
    drop(closed);

    let backend = Arc::new(ConsulBackend::new(&consul_config(address)).expect("backend"));
    let registrar = ServiceRegistrar::new(backend);
    let err = registrar
        .register(&ServiceInfo::new("user", 8080), "10.0.0.12:8080", &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(err.is(ErrorCode::RegistrationFailed));
}

#[tokio::test]
async fn factory_refresher_fills_pool_from_consul() {
    let address = start_fake_consul(FakeConsul::default()).await;
    let pool = BackendPool::new();
    let refresher =
        DiscoveryFactory::create_refresher(&consul_config(address), pool.clone(), ["user", "order"])
            .expect("refresher");

    assert_eq!(refresher.refresh_once().await, 2);
    assert_eq!(pool.len("user"), 2);
    assert!(pool.is_empty("order"));
}
