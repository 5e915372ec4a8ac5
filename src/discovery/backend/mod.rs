//! 服务发现后端抽象和实现

pub mod consul;
pub mod memory;

pub use consul::ConsulBackend;
pub use memory::InMemoryBackend;

use async_trait::async_trait;

use crate::balancer::Backend;
use crate::discovery::registration::RegistrationRecord;
use crate::error::Result;

/// 服务发现后端 trait
///
/// 由于需要动态分发（dyn），使用 async-trait
#[async_trait]
pub trait DiscoveryBackend: Send + Sync {
    /// 注册服务实例
    ///
    /// 相同 `service_id` 的重复注册覆盖之前的记录。
    async fn register_service(&self, record: &RegistrationRecord) -> Result<()>;

    /// 注销服务实例
    async fn deregister_service(&self, service_id: &str) -> Result<()>;

    /// 查询服务当前健康的实例
    async fn discover(&self, service_name: &str) -> Result<Vec<Backend>>;
}
