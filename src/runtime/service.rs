//! 用户服务接口
//!
//! 用户实现 [`RestService`] 或 [`GrpcService`]，在构建运行时时用 [`ServiceKind`]
//! 明确声明服务类型。

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::server::{Endpoint, Listener};
use crate::types::ServiceInfo;

/// 所有服务的公共生命周期钩子
#[async_trait]
pub trait BaseService: Send + Sync {
    /// 初始化，可以在这里向监听器注册额外的端点或过滤器
    async fn init(
        &self,
        _cancel: &CancellationToken,
        _config_path: Option<&Path>,
        _listener: &mut dyn Listener,
    ) -> Result<()> {
        Ok(())
    }

    /// 覆盖配置文件中的服务信息
    fn service_info(&self) -> Option<ServiceInfo> {
        None
    }

    /// 开发模式下在 `/apidefine/<name>.api` 暴露的 API 定义
    fn api_define(&self) -> String {
        String::new()
    }

    /// 启动后台任务，在监听器启动之前调用
    async fn start(&self) -> Result<()> {
        Ok(())
    }

    /// 停止后台任务，在监听器停止之后调用
    async fn stop(&self) -> Result<()> {
        Ok(())
    }
}

/// HTTP 服务
pub trait RestService: BaseService {
    /// 服务对外提供的端点，不能为空
    fn endpoints(&self) -> Vec<Endpoint>;
}

/// gRPC 服务
#[cfg(feature = "grpc")]
pub trait GrpcService: BaseService {
    /// 服务对外提供的 gRPC 路由，为 None 时初始化失败
    fn grpc_routes(&self) -> Option<tonic::service::Routes>;
}

/// 服务类型
#[derive(Clone)]
pub enum ServiceKind {
    Rest(Arc<dyn RestService>),
    #[cfg(feature = "grpc")]
    Grpc(Arc<dyn GrpcService>),
}

impl ServiceKind {
    pub fn rest(service: impl RestService + 'static) -> Self {
        ServiceKind::Rest(Arc::new(service))
    }

    #[cfg(feature = "grpc")]
    pub fn grpc(service: impl GrpcService + 'static) -> Self {
        ServiceKind::Grpc(Arc::new(service))
    }

    pub fn base(&self) -> &dyn BaseService {
        match self {
            ServiceKind::Rest(service) => service.as_ref(),
            #[cfg(feature = "grpc")]
            ServiceKind::Grpc(service) => service.as_ref(),
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            ServiceKind::Rest(_) => "rest",
            #[cfg(feature = "grpc")]
            ServiceKind::Grpc(_) => "grpc",
        }
    }
}

impl std::fmt::Debug for ServiceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.kind_name())
    }
}
