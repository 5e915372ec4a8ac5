//! 微服务运行时框架
//!
//! 提供统一的服务生命周期管理：配置加载、端点注册、监听器启动、
//! 服务注册与注销、优雅停机和清理回调。
//!
//! # 使用示例
//!
//! ```rust,no_run
//! use flare_service_boot::config::{Config, StaticConfig};
//! use flare_service_boot::runtime::{BaseService, RestService, ServiceRuntime};
//! use flare_service_boot::server::Endpoint;
//! use flare_service_boot::types::ServiceInfo;
//! use tokio_util::sync::CancellationToken;
//!
//! struct Users;
//!
//! impl BaseService for Users {}
//!
//! impl RestService for Users {
//!     fn endpoints(&self) -> Vec<Endpoint> {
//!         vec![Endpoint::get("/users", |_| async { "[]" })]
//!     }
//! }
//!
//! # async fn example() -> flare_service_boot::error::Result<()> {
//! let config = Config::new(ServiceInfo::new("user-service", 8080));
//! let cancel = CancellationToken::new();
//! let mut runtime = ServiceRuntime::rest(Users, StaticConfig(config));
//! runtime.add_clean_fn(|| println!("closing connection pools"));
//!
//! runtime.init(&cancel).await?;
//! runtime.start(&cancel).await?;
//! // ...
//! runtime.stop().await;
//! # Ok(())
//! # }
//! ```

pub mod cleanup;
pub mod config;
#[allow(clippy::module_inception)]
pub mod runtime;
pub mod service;

pub use cleanup::CleanupRegistry;
pub use config::{FatalHandler, RuntimeConfig};
pub use runtime::{RuntimeState, ServiceRuntime};
#[cfg(feature = "grpc")]
pub use service::GrpcService;
pub use service::{BaseService, RestService, ServiceKind};
