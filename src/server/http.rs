//! 基于 axum 的 HTTP 监听器

use async_trait::async_trait;
use axum::Router;
use axum::middleware::{self, Next};
use axum::routing::{MethodFilter, MethodRouter};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::{ErrorSignal, Filter, Handler, Listener, Method, Request, pattern_matches};
use crate::error::{ErrorCode, FlareError, Result, scope};
use crate::types::TlsConfig;

/// 监听器配置
#[derive(Debug, Clone)]
pub struct ListenerConfig {
    /// 绑定地址 `host:port`
    pub bind_address: String,
    pub tls: Option<TlsConfig>,
    /// 停止时等待处理中请求的最长时间
    pub drain_timeout: Duration,
}

impl ListenerConfig {
    pub fn new(bind_address: impl Into<String>) -> Self {
        Self {
            bind_address: bind_address.into(),
            tls: None,
            drain_timeout: Duration::from_secs(5),
        }
    }

    pub fn with_tls(mut self, tls: Option<TlsConfig>) -> Self {
        self.tls = tls;
        self
    }

    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }
}

struct Running {
    shutdown: CancellationToken,
    task: JoinHandle<()>,
    local_addr: SocketAddr,
}

pub struct HttpListener {
    config: ListenerConfig,
    routes: BTreeMap<String, Vec<(Method, Handler)>>,
    // 与 axum 相同的路由树，注册时提前发现冲突
    matcher: matchit::Router<()>,
    filters: Vec<(String, Filter)>,
    #[cfg(feature = "grpc")]
    grpc_routes: Option<tonic::service::Routes>,
    running: Option<Running>,
}

impl HttpListener {
    pub fn new(config: ListenerConfig) -> Self {
        Self {
            config,
            routes: BTreeMap::new(),
            matcher: matchit::Router::new(),
            filters: Vec::new(),
            #[cfg(feature = "grpc")]
            grpc_routes: None,
            running: None,
        }
    }

    pub fn config(&self) -> &ListenerConfig {
        &self.config
    }

    /// 已注册的端点数
    pub fn endpoint_count(&self) -> usize {
        self.routes.values().map(Vec::len).sum()
    }

    fn validate_path(path: &str) -> Result<()> {
        let valid = path.starts_with('/')
            && path
                .split('/')
                .all(|segment| !segment.starts_with(':') && !segment.starts_with('*'));
        if valid {
            Ok(())
        } else {
            Err(FlareError::configuration(
                scope::LISTENER,
                format!("invalid endpoint path '{}'", path),
            ))
        }
    }

    /// 参数名不参与比较：`/users/{id}` 与 `/users/{uid}` 是同一路由
    fn route_shape(path: &str) -> String {
        path.split('/')
            .map(|segment| {
                if segment.starts_with("{*") && segment.ends_with('}') {
                    "{*}"
                } else if segment.starts_with('{') && segment.ends_with('}') {
                    "{}"
                } else {
                    segment
                }
            })
            .collect::<Vec<_>>()
            .join("/")
    }

    /// 与 `path` 形状相同的已注册路径
    fn registered_path(&self, path: &str) -> Option<&str> {
        let shape = Self::route_shape(path);
        self.routes
            .keys()
            .find(|existing| Self::route_shape(existing) == shape)
            .map(String::as_str)
    }

    fn build_router(&self) -> Router {
        let mut router = Router::new();

        for (path, methods) in &self.routes {
            let mut method_router: MethodRouter = MethodRouter::new();
            for (method, handler) in methods {
                // register 已校验过方法
                let Ok(filter) = MethodFilter::try_from(method.clone()) else {
                    continue;
                };
                let handler = handler.clone();
                method_router = method_router.on(filter, move |req: Request| {
                    let handler = handler.clone();
                    async move { handler(req).await }
                });
            }
            router = router.route(path, method_router);
        }

        #[cfg(feature = "grpc")]
        if let Some(routes) = self.grpc_routes.clone() {
            router = router.merge(routes.into_axum_router());
        }

        // 后加的 layer 在外层，倒序叠加使先添加的过滤器先执行
        for (pattern, filter) in self.filters.iter().rev() {
            let pattern = pattern.clone();
            let filter = filter.clone();
            router = router.layer(middleware::from_fn(move |req: Request, next: Next| {
                let pattern = pattern.clone();
                let filter = filter.clone();
                async move {
                    if pattern_matches(&pattern, req.uri().path()) {
                        filter(req, next).await
                    } else {
                        next.run(req).await
                    }
                }
            }));
        }

        router
    }

    fn start_failed(&self, message: impl std::fmt::Display) -> FlareError {
        FlareError::new(
            ErrorCode::ListenerStartFailed,
            scope::LISTENER,
            format!("listen on {} failed: {}", self.config.bind_address, message),
        )
    }

    fn serve_plain(
        listener: TcpListener,
        router: Router,
        shutdown: CancellationToken,
        err_tx: oneshot::Sender<FlareError>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let result = axum::serve(listener, router)
                .with_graceful_shutdown(async move { shutdown.cancelled().await })
                .await;
            if let Err(e) = result {
                error!(error = %e, "HTTP listener terminated");
                let _ = err_tx.send(FlareError::new(
                    ErrorCode::ListenerFailed,
                    scope::LISTENER,
                    e.to_string(),
                ));
            }
        })
    }

    #[cfg(feature = "tls")]
    fn serve_tls(
        listener: TcpListener,
        tls: axum_server::tls_rustls::RustlsConfig,
        router: Router,
        shutdown: CancellationToken,
        drain_timeout: Duration,
        err_tx: oneshot::Sender<FlareError>,
    ) -> Result<JoinHandle<()>> {
        let std_listener = listener.into_std()?;
        let handle = axum_server::Handle::new();

        let shutdown_handle = handle.clone();
        tokio::spawn(async move {
            shutdown.cancelled().await;
            shutdown_handle.graceful_shutdown(Some(drain_timeout));
        });

        let server = axum_server::from_tcp_rustls(std_listener, tls).handle(handle);
        Ok(tokio::spawn(async move {
            if let Err(e) = server.serve(router.into_make_service()).await {
                error!(error = %e, "HTTPS listener terminated");
                let _ = err_tx.send(FlareError::new(
                    ErrorCode::ListenerFailed,
                    scope::LISTENER,
                    e.to_string(),
                ));
            }
        }))
    }
}

#[async_trait]
impl Listener for HttpListener {
    fn register(&mut self, path: &str, method: Method, handler: Handler) -> Result<()> {
        if self.running.is_some() {
            return Err(FlareError::invalid_state(
                scope::LISTENER,
                "cannot register endpoints after the listener started",
            ));
        }
        Self::validate_path(path)?;
        if MethodFilter::try_from(method.clone()).is_err() {
            return Err(FlareError::configuration(
                scope::LISTENER,
                format!("unsupported method {} for {}", method, path),
            ));
        }
        if self.is_registered(path, &method) {
            return Err(FlareError::duplicate_endpoint(scope::LISTENER, method.as_str(), path));
        }
        match self.registered_path(path) {
            Some(existing) if existing != path => {
                return Err(FlareError::configuration(
                    scope::LISTENER,
                    format!("endpoint path '{}' conflicts with '{}'", path, existing),
                ));
            }
            Some(_) => {}
            None => self.matcher.insert(path, ()).map_err(|e| {
                FlareError::configuration(
                    scope::LISTENER,
                    format!("endpoint path '{}' conflicts with registered routes: {}", path, e),
                )
            })?,
        }

        self.routes
            .entry(path.to_string())
            .or_default()
            .push((method, handler));
        Ok(())
    }

    fn is_registered(&self, path: &str, method: &Method) -> bool {
        self.registered_path(path)
            .and_then(|existing| self.routes.get(existing))
            .is_some_and(|methods| methods.iter().any(|(m, _)| m == method))
    }

    fn add_first_filter(&mut self, pattern: &str, filter: Filter) {
        self.filters.push((pattern.to_string(), filter));
    }

    #[cfg(feature = "grpc")]
    fn add_grpc_routes(&mut self, routes: tonic::service::Routes) -> Result<()> {
        if self.grpc_routes.is_some() {
            return Err(FlareError::configuration(
                scope::LISTENER,
                "gRPC routes already registered",
            ));
        }
        self.grpc_routes = Some(routes);
        Ok(())
    }

    async fn start(&mut self) -> Result<ErrorSignal> {
        if self.running.is_some() {
            return Err(FlareError::invalid_state(scope::LISTENER, "listener already started"));
        }

        #[cfg(feature = "tls")]
        let tls = match &self.config.tls {
            Some(tls) => Some(
                axum_server::tls_rustls::RustlsConfig::from_pem_file(&tls.cert_file, &tls.key_file)
                    .await
                    .map_err(|e| {
                        FlareError::new(
                            ErrorCode::TlsConfigError,
                            scope::LISTENER,
                            format!("load tls material failed: {}", e),
                        )
                    })?,
            ),
            None => None,
        };
        #[cfg(not(feature = "tls"))]
        if self.config.tls.is_some() {
            return Err(FlareError::new(
                ErrorCode::TlsConfigError,
                scope::LISTENER,
                "https requires the `tls` feature",
            ));
        }

        let listener = TcpListener::bind(&self.config.bind_address)
            .await
            .map_err(|e| self.start_failed(e))?;
        let local_addr = listener.local_addr().map_err(|e| self.start_failed(e))?;

        let router = self.build_router();
        let shutdown = CancellationToken::new();
        let (err_tx, err_rx) = oneshot::channel();

        #[cfg(feature = "tls")]
        let task = match tls {
            Some(tls) => Self::serve_tls(
                listener,
                tls,
                router,
                shutdown.clone(),
                self.config.drain_timeout,
                err_tx,
            )?,
            None => Self::serve_plain(listener, router, shutdown.clone(), err_tx),
        };
        #[cfg(not(feature = "tls"))]
        let task = Self::serve_plain(listener, router, shutdown.clone(), err_tx);

        info!(
            address = %local_addr,
            endpoints = self.endpoint_count(),
            tls = self.config.tls.is_some(),
            "🚀 HTTP listener started"
        );
        self.running = Some(Running {
            shutdown,
            task,
            local_addr,
        });
        Ok(err_rx)
    }

    async fn stop(&mut self) {
        let Some(mut running) = self.running.take() else {
            return;
        };

        running.shutdown.cancel();
        match tokio::time::timeout(self.config.drain_timeout, &mut running.task).await {
            Ok(_) => info!(address = %running.local_addr, "HTTP listener stopped"),
            Err(_) => {
                warn!(
                    address = %running.local_addr,
                    timeout = ?self.config.drain_timeout,
                    "HTTP listener drain timed out, aborting"
                );
                running.task.abort();
            }
        }
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        self.running.as_ref().map(|r| r.local_addr)
    }
}

impl Drop for HttpListener {
    fn drop(&mut self) {
        if let Some(running) = self.running.take() {
            running.shutdown.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::handler_fn;

    fn listener() -> HttpListener {
        HttpListener::new(ListenerConfig::new("127.0.0.1:0"))
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut listener = listener();
        listener
            .register("/users", Method::GET, handler_fn(|_| async { "ok" }))
            .expect("first");
        listener
            .register("/users", Method::POST, handler_fn(|_| async { "ok" }))
            .expect("other method");
        let err = listener
            .register("/users", Method::GET, handler_fn(|_| async { "ok" }))
            .unwrap_err();
        assert!(err.is(ErrorCode::DuplicateEndpoint));
        assert_eq!(listener.endpoint_count(), 2);
    }

    #[test]
    fn invalid_paths_are_rejected() {
        let mut listener = listener();
        for path in ["users", "/users/:id", "/files/*rest"] {
            let err = listener
                .register(path, Method::GET, handler_fn(|_| async { "ok" }))
                .unwrap_err();
            assert!(err.is(ErrorCode::ConfigurationError), "{}", path);
        }
    }

    #[test]
    fn renamed_parameter_is_the_same_route() {
        let mut listener = listener();
        listener
            .register("/users/{id}", Method::GET, handler_fn(|_| async { "ok" }))
            .expect("first");

        let err = listener
            .register("/users/{uid}", Method::GET, handler_fn(|_| async { "ok" }))
            .unwrap_err();
        assert!(err.is(ErrorCode::DuplicateEndpoint), "{}", err);
        assert!(listener.is_registered("/users/{name}", &Method::GET));

        let err = listener
            .register("/users/{name}", Method::POST, handler_fn(|_| async { "ok" }))
            .unwrap_err();
        assert!(err.is(ErrorCode::ConfigurationError), "{}", err);
        assert_eq!(listener.endpoint_count(), 1);
    }

    #[tokio::test]
    async fn rejected_conflicts_leave_listener_startable() {
        let mut listener = listener();
        listener
            .register("/users/{id}", Method::GET, handler_fn(|_| async { "ok" }))
            .expect("register");
        listener
            .register("/users/{id}", Method::DELETE, handler_fn(|_| async { "ok" }))
            .expect("other method on same path");
        assert!(
            listener
                .register("/users/{name}", Method::PUT, handler_fn(|_| async { "ok" }))
                .is_err()
        );

        let signal = listener.start().await.expect("start");
        listener.stop().await;
        assert!(signal.await.is_err());
    }

    #[tokio::test]
    async fn start_reports_bind_failure() {
        let occupied = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        let address = occupied.local_addr().expect("addr");

        let mut listener = HttpListener::new(ListenerConfig::new(address.to_string()));
        let err = listener.start().await.unwrap_err();
        assert!(err.is(ErrorCode::ListenerStartFailed));
        assert!(listener.local_addr().is_none());
    }

    #[tokio::test]
    async fn stop_ends_error_signal_without_error() {
        let mut listener = listener();
        listener
            .register("/ping", Method::GET, handler_fn(|_| async { "pong" }))
            .expect("register");
        let signal = listener.start().await.expect("start");
        assert!(listener.local_addr().is_some());

        listener.stop().await;
        assert!(signal.await.is_err());
        assert!(listener.local_addr().is_none());
    }
}
