//! HTTP 服务端模块
//!
//! 提供端点定义、过滤器和监听器抽象。

pub mod filter;
pub mod http;

pub use filter::{access_log_filter, text_handler};
pub use http::{HttpListener, ListenerConfig};

use async_trait::async_trait;
use axum::middleware::Next;
use axum::response::IntoResponse;
use futures::future::BoxFuture;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::oneshot;

use crate::error::{FlareError, Result};

pub use ::http::Method;

/// 请求类型
pub type Request = axum::extract::Request;
/// 响应类型
pub type Response = axum::response::Response;

/// 端点处理函数
pub type Handler = Arc<dyn Fn(Request) -> BoxFuture<'static, Response> + Send + Sync>;

/// 过滤器：拿到请求和后续处理链，决定是否放行
pub type Filter = Arc<dyn Fn(Request, Next) -> BoxFuture<'static, Response> + Send + Sync>;

/// 监听器运行期间的致命错误通知
///
/// 收到错误表示监听器异常退出；发送端被丢弃表示正常停止。
pub type ErrorSignal = oneshot::Receiver<FlareError>;

/// 按监听配置创建监听器，运行时在 `init` 时调用一次
pub type ListenerFactory = Arc<dyn Fn(ListenerConfig) -> Box<dyn Listener> + Send + Sync>;

/// 默认的 [`HttpListener`] 工厂
pub fn http_listener_factory() -> ListenerFactory {
    Arc::new(|config: ListenerConfig| Box::new(HttpListener::new(config)) as Box<dyn Listener>)
}

/// 把异步函数包装成 [`Handler`]
pub fn handler_fn<F, Fut, R>(f: F) -> Handler
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse,
{
    Arc::new(move |req| {
        let fut = f(req);
        Box::pin(async move { fut.await.into_response() })
    })
}

/// 把异步函数包装成 [`Filter`]
pub fn filter_fn<F, Fut>(f: F) -> Filter
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    Arc::new(move |req, next| Box::pin(f(req, next)))
}

/// 端点定义
#[derive(Clone)]
pub struct Endpoint {
    pub path: String,
    pub method: Method,
    pub description: String,
    pub handler: Handler,
}

impl Endpoint {
    pub fn new(method: Method, path: impl Into<String>, handler: Handler) -> Self {
        Self {
            path: path.into(),
            method,
            description: String::new(),
            handler,
        }
    }

    pub fn get<F, Fut, R>(path: impl Into<String>, f: F) -> Self
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoResponse,
    {
        Self::new(Method::GET, path, handler_fn(f))
    }

    pub fn post<F, Fut, R>(path: impl Into<String>, f: F) -> Self
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoResponse,
    {
        Self::new(Method::POST, path, handler_fn(f))
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint")
            .field("path", &self.path)
            .field("method", &self.method)
            .field("description", &self.description)
            .finish()
    }
}

/// 监听器
///
/// 端点和过滤器必须在 [`Listener::start`] 之前注册。
#[async_trait]
pub trait Listener: Send + Sync {
    /// 注册端点，同一 (method, path) 重复注册返回错误
    fn register(&mut self, path: &str, method: Method, handler: Handler) -> Result<()>;

    /// 是否已注册 (method, path)
    fn is_registered(&self, path: &str, method: &Method) -> bool;

    /// 添加最先执行的过滤器
    ///
    /// `pattern` 为 `/*` 时匹配所有路径；以 `/*` 结尾时按前缀匹配；否则精确匹配。
    /// 多个过滤器按添加顺序执行。
    fn add_first_filter(&mut self, pattern: &str, filter: Filter);

    /// 合并 gRPC 服务路由
    #[cfg(feature = "grpc")]
    fn add_grpc_routes(&mut self, routes: tonic::service::Routes) -> Result<()>;

    /// 绑定端口并开始服务
    ///
    /// 绑定失败同步返回错误；之后的运行期错误通过返回的 [`ErrorSignal`] 通知。
    async fn start(&mut self) -> Result<ErrorSignal>;

    /// 停止接收新连接，等待处理中的请求结束
    async fn stop(&mut self);

    /// 实际监听的地址，未启动时为 None
    fn local_addr(&self) -> Option<SocketAddr>;
}

/// 过滤器路径匹配
pub fn pattern_matches(pattern: &str, path: &str) -> bool {
    if pattern == "*" || pattern == "/*" {
        return true;
    }
    match pattern.strip_suffix("/*") {
        Some(prefix) => path == prefix || path.starts_with(&format!("{}/", prefix)),
        None => pattern == path,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_matching() {
        assert!(pattern_matches("/*", "/anything/at/all"));
        assert!(pattern_matches("/api/*", "/api/users"));
        assert!(pattern_matches("/api/*", "/api"));
        assert!(!pattern_matches("/api/*", "/apiary"));
        assert!(pattern_matches("/health", "/health"));
        assert!(!pattern_matches("/health", "/health/live"));
    }
}
