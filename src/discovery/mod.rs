//! 服务发现模块
//!
//! 负责本实例的注册与注销，以及为负载均衡提供健康实例列表。

pub mod backend;
pub mod config;
pub mod factory;
pub mod registrar;
pub mod registration;
pub mod watch;

pub use backend::{ConsulBackend, DiscoveryBackend, InMemoryBackend};
pub use config::{BackendType, DiscoveryConfig};
pub use factory::DiscoveryFactory;
pub use registrar::{RegistrationState, ServiceRegistrar};
pub use registration::{HEALTH_PATH, HealthCheck, RegistrationRecord, check_id, service_id};
pub use watch::PoolRefresher;
