//! Flare Service Boot
//!
//! 微服务运行时核心：结构化错误、服务描述、服务注册与发现、负载均衡拨号、
//! HTTP/gRPC 监听器以及统一的服务生命周期管理。

pub mod balancer;
pub mod client;
pub mod config;
pub mod discovery;
pub mod error;
pub mod health;
pub mod logging;
pub mod runtime;
pub mod server;
pub mod types;
pub mod utils;

// Re-exports
pub use balancer::{Backend, BackendPool, Balancer, LoadBalanceStrategy, LoadBalancer};
pub use client::{BalancedConnection, BalancedConnector, BalancedDialer, DialerConfig};
pub use config::{Config, ConfigLoader, ServerConfig, StaticConfig, TomlFileLoader};
pub use discovery::{
    ConsulBackend, DiscoveryBackend, DiscoveryConfig, DiscoveryFactory, InMemoryBackend,
    PoolRefresher, RegistrationState, ServiceRegistrar,
};
pub use error::{ErrorCategory, ErrorCode, FlareError, Result, ResultExt};
pub use health::{HealthService, HealthStatus};
pub use logging::{LogConfig, init_logging};
pub use types::{Scheme, ServiceInfo, TlsConfig};

// 运行时框架 re-exports
#[cfg(feature = "grpc")]
pub use runtime::GrpcService;
pub use runtime::{BaseService, RestService, RuntimeConfig, RuntimeState, ServiceKind, ServiceRuntime};
pub use server::{Endpoint, HttpListener, Listener, ListenerConfig, ListenerFactory};
