//! 把负载均衡拨号器接入 HTTP / gRPC 客户端
//!
//! URI 中的主机名即服务名：`http://user-service/users` 会从 `user-service`
//! 的后端池中选出一个实例建立连接。

use futures::future::BoxFuture;
use http::Uri;
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::{Connected, Connection};
use hyper_util::rt::{TokioExecutor, TokioIo};
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio_util::sync::CancellationToken;
use tower::Service;

use super::{BalancedConnection, BalancedDialer};
use crate::error::{FlareError, Result, scope};
use crate::utils::join_host_port;

/// 通过负载均衡连接器发请求的 HTTP/1 客户端
pub type BalancedHttpClient = Client<BalancedConnector, axum::body::Body>;

/// 按 URI 主机名拨号的连接器
#[derive(Clone)]
pub struct BalancedConnector {
    dialer: Arc<BalancedDialer>,
    cancel: CancellationToken,
}

impl BalancedConnector {
    pub fn new(dialer: Arc<BalancedDialer>) -> Self {
        Self {
            dialer,
            cancel: CancellationToken::new(),
        }
    }

    /// `cancel` 取消后，新的连接请求立即失败
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn dialer(&self) -> &Arc<BalancedDialer> {
        &self.dialer
    }

    /// 构建 HTTP 客户端，连接由客户端连接池复用
    pub fn http_client(self) -> BalancedHttpClient {
        Client::builder(TokioExecutor::new()).build(self)
    }

    /// 构建惰性 gRPC 通道，第一次调用时才拨号；需在 tokio 运行时中调用
    #[cfg(feature = "grpc")]
    pub fn grpc_channel(self, service_name: &str) -> Result<tonic::transport::Channel> {
        let endpoint = tonic::transport::Endpoint::from_shared(format!("http://{}", service_name))
            .map_err(|e| {
                FlareError::invalid_address(
                    scope::DIALER,
                    format!("invalid grpc target '{}': {}", service_name, e),
                )
            })?;
        Ok(endpoint.connect_with_connector_lazy(self))
    }

    fn dial_address(uri: &Uri) -> Result<String> {
        let host = uri.host().ok_or_else(|| {
            FlareError::invalid_address(scope::DIALER, format!("uri '{}' has no host", uri))
        })?;
        let host = host.trim_start_matches('[').trim_end_matches(']');
        let port = uri.port_u16().unwrap_or(match uri.scheme_str() {
            Some("https") => 443,
            _ => 80,
        });
        Ok(join_host_port(host, port))
    }
}

impl Service<Uri> for BalancedConnector {
    type Response = TokioIo<BalancedConnection>;
    type Error = FlareError;
    type Future = BoxFuture<'static, Result<Self::Response>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, uri: Uri) -> Self::Future {
        let dialer = self.dialer.clone();
        let cancel = self.cancel.clone();
        Box::pin(async move {
            let address = Self::dial_address(&uri)?;
            let connection = dialer.dial(&cancel, "tcp", &address).await?;
            Ok(TokioIo::new(connection))
        })
    }
}

impl Connection for BalancedConnection {
    fn connected(&self) -> Connected {
        self.stream().connected()
    }
}

impl std::fmt::Debug for BalancedConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BalancedConnector")
            .field("dialer", &self.dialer)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(feature = "grpc")]
    fn connector() -> BalancedConnector {
        use crate::balancer::{BackendPool, LoadBalancer};

        let balancer = Arc::new(LoadBalancer::random(BackendPool::new()));
        BalancedConnector::new(Arc::new(BalancedDialer::builder(balancer).build()))
    }

    #[test]
    fn dial_address_uses_scheme_default_port() {
        let uri: Uri = "http://user-service/users".parse().expect("uri");
        assert_eq!(BalancedConnector::dial_address(&uri).expect("address"), "user-service:80");

        let uri: Uri = "https://user-service:8443/".parse().expect("uri");
        assert_eq!(BalancedConnector::dial_address(&uri).expect("address"), "user-service:8443");

        let uri: Uri = "http://[::1]:9000/".parse().expect("uri");
        assert_eq!(BalancedConnector::dial_address(&uri).expect("address"), "[::1]:9000");

        let uri: Uri = "/relative".parse().expect("uri");
        assert!(BalancedConnector::dial_address(&uri).is_err());
    }

    #[cfg(feature = "grpc")]
    #[tokio::test]
    async fn grpc_channel_is_lazy() {
        assert!(connector().grpc_channel("user-service").is_ok());

        let err = connector().grpc_channel("user service").unwrap_err();
        assert!(err.is(crate::error::ErrorCode::InvalidAddress));
    }
}
