//! 微服务运行时实现
//!
//! 生命周期：
//!
//! ```text
//! Created -> Initialized -> EndpointsRegistered -> Listening
//!         -> DiscoveryRegistered -> Running -> Stopping -> Stopped
//! ```
//!
//! - `init`：加载配置，构建监听器，初始化服务并注册端点（不启动监听）
//! - `start`：启动服务后台任务和监听器，端口可连接后注册服务发现
//! - `stop`：可在任意阶段调用，幂等；按 健康状态 -> 注销 -> 监听器 -> 服务 -> 清理回调 的顺序停机

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{Config, ConfigLoader, StaticConfig};
use crate::discovery::{DiscoveryFactory, HEALTH_PATH, ServiceRegistrar};
use crate::error::{ErrorCode, FlareError, Result, scope};
use crate::health::{HealthService, HealthStatus};
use crate::logging::init_logging;
use crate::runtime::cleanup::CleanupRegistry;
use crate::runtime::config::RuntimeConfig;
use crate::runtime::service::{RestService, ServiceKind};
use crate::server::{
    ErrorSignal, Listener, ListenerConfig, ListenerFactory, Method, access_log_filter,
    http_listener_factory, text_handler,
};
use crate::types::ServiceInfo;
use crate::utils::{join_host_port, local_ip, probe_address, wait_for_server_ready};

/// 运行时状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeState {
    Created,
    Initialized,
    EndpointsRegistered,
    Listening,
    DiscoveryRegistered,
    Running,
    Stopping,
    Stopped,
}

struct Supervisor {
    stop: CancellationToken,
    task: JoinHandle<()>,
}

/// 微服务运行时
///
/// 统一管理服务的生命周期，包括：
/// - 配置加载和端点注册
/// - 监听器启动和优雅停机
/// - 服务注册和注销
/// - 停机清理回调
///
/// # 使用示例
///
/// ```rust,no_run
/// use flare_service_boot::config::TomlFileLoader;
/// use flare_service_boot::runtime::{BaseService, RestService, ServiceRuntime};
/// use flare_service_boot::server::Endpoint;
/// use tokio_util::sync::CancellationToken;
///
/// struct Hello;
///
/// impl BaseService for Hello {}
///
/// impl RestService for Hello {
///     fn endpoints(&self) -> Vec<Endpoint> {
///         vec![Endpoint::get("/hello", |_| async { "hello" })]
///     }
/// }
///
/// # async fn example() -> anyhow::Result<()> {
/// ServiceRuntime::rest(Hello, TomlFileLoader::from_env())
///     .run(CancellationToken::new())
///     .await
/// # }
/// ```
pub struct ServiceRuntime {
    service: ServiceKind,
    loader: Box<dyn ConfigLoader>,
    config: RuntimeConfig,
    state: RuntimeState,
    app_config: Option<Config>,
    service_info: Option<ServiceInfo>,
    listener: Option<Box<dyn Listener>>,
    listener_factory: ListenerFactory,
    registrar: Option<Arc<ServiceRegistrar>>,
    health: HealthService,
    cleanups: CleanupRegistry,
    supervisor: Option<Supervisor>,
    service_started: bool,
    install_logging: bool,
}

impl ServiceRuntime {
    /// 创建新的服务运行时
    pub fn new(service: ServiceKind, loader: impl ConfigLoader + 'static) -> Self {
        Self {
            service,
            loader: Box::new(loader),
            config: RuntimeConfig::default(),
            state: RuntimeState::Created,
            app_config: None,
            service_info: None,
            listener: None,
            listener_factory: http_listener_factory(),
            registrar: None,
            health: HealthService::new(),
            cleanups: CleanupRegistry::new(),
            supervisor: None,
            service_started: false,
            install_logging: false,
        }
    }

    /// HTTP 服务运行时
    pub fn rest(service: impl RestService + 'static, loader: impl ConfigLoader + 'static) -> Self {
        Self::new(ServiceKind::rest(service), loader)
    }

    /// gRPC 服务运行时
    #[cfg(feature = "grpc")]
    pub fn grpc(
        service: impl crate::runtime::service::GrpcService + 'static,
        loader: impl ConfigLoader + 'static,
    ) -> Self {
        Self::new(ServiceKind::grpc(service), loader)
    }

    /// 使用内存中的配置
    pub fn from_config(service: ServiceKind, config: Config) -> Self {
        Self::new(service, StaticConfig(config))
    }

    /// 设置运行时配置
    pub fn with_config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// 使用指定的注册器，忽略配置中的 `[discovery]`
    pub fn with_registrar(mut self, registrar: Arc<ServiceRegistrar>) -> Self {
        self.registrar = Some(registrar);
        self
    }

    /// 替换默认的 HTTP 监听器
    pub fn with_listener_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn(ListenerConfig) -> Box<dyn Listener> + Send + Sync + 'static,
    {
        self.listener_factory = Arc::new(factory);
        self
    }

    pub fn state(&self) -> RuntimeState {
        self.state
    }

    pub fn health(&self) -> &HealthService {
        &self.health
    }

    pub fn registrar(&self) -> Option<&Arc<ServiceRegistrar>> {
        self.registrar.as_ref()
    }

    pub fn service_info(&self) -> Option<&ServiceInfo> {
        self.service_info.as_ref()
    }

    /// 监听器实际绑定的地址，未启动时为 None
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.as_ref().and_then(|l| l.local_addr())
    }

    /// 注册停机清理回调，按注册顺序在 `stop` 的最后执行
    pub fn add_clean_fn<F>(&mut self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let name = format!("cleanup-{}", self.cleanups.len() + 1);
        self.cleanups.add(name, f);
    }

    fn expect_state(&self, expected: RuntimeState, operation: &str) -> Result<()> {
        if self.state == expected {
            return Ok(());
        }
        Err(FlareError::invalid_state(
            scope::RUNTIME,
            format!("{} requires state {:?}, current state is {:?}", operation, expected, self.state),
        ))
    }

    fn check_cancelled(cancel: &CancellationToken, operation: &str) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(FlareError::cancelled(scope::RUNTIME, format!("{} cancelled", operation)));
        }
        Ok(())
    }

    /// 初始化
    ///
    /// 加载并校验配置，构建监听器，调用服务的 `init`，注册端点、健康检查和
    /// 开发模式端点。任何一步失败都不会启动监听器。
    pub async fn init(&mut self, cancel: &CancellationToken) -> Result<Config> {
        self.expect_state(RuntimeState::Created, "init")?;
        Self::check_cancelled(cancel, "init")?;

        let loaded = self.loader.load()?;
        let config = loaded.config;
        if self.install_logging {
            if let Err(e) = init_logging(&config.log) {
                debug!(error = %e, "Tracing subscriber already installed");
            }
        }

        let info = match self.service.base().service_info() {
            Some(info) => info,
            None => config.service_info()?.clone(),
        };
        info.validate()?;

        let bind_address = join_host_port(&config.server.bind_host, info.port);
        let listener_config = ListenerConfig::new(bind_address)
            .with_tls(info.tls.clone())
            .with_drain_timeout(self.config.shutdown_timeout);
        let mut listener = (self.listener_factory)(listener_config);

        let service = self.service.clone();
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(FlareError::cancelled(scope::RUNTIME, "init cancelled"));
            }
            result = service.base().init(cancel, loaded.path.as_deref(), listener.as_mut()) => {
                result.map_err(|e| FlareError::wrap(ErrorCode::ServiceInitFailed, scope::RUNTIME, e))?;
            }
        }
        self.state = RuntimeState::Initialized;

        self.register_endpoints(listener.as_mut(), &info)?;
        self.state = RuntimeState::EndpointsRegistered;

        if self.registrar.is_none() {
            if let Some(discovery) = &config.discovery {
                self.registrar = Some(Arc::new(DiscoveryFactory::create_registrar(discovery)?));
            }
        }

        self.health
            .set_status(info.name.clone(), HealthStatus::NotServing)
            .await;

        info!(
            service = %info.name,
            version = %info.version,
            kind = self.service.kind_name(),
            dev_mode = info.dev_mode,
            "Service initialized"
        );

        self.listener = Some(listener);
        self.service_info = Some(info);
        self.app_config = Some(config.clone());
        Ok(config)
    }

    fn register_endpoints(&self, listener: &mut dyn Listener, info: &ServiceInfo) -> Result<()> {
        match &self.service {
            ServiceKind::Rest(service) => {
                let endpoints = service.endpoints();
                if endpoints.is_empty() {
                    warn!(service = %info.name, "Service did not register any endpoint");
                    return Err(FlareError::no_endpoints(scope::RUNTIME));
                }
                for endpoint in endpoints {
                    listener.register(&endpoint.path, endpoint.method.clone(), endpoint.handler)?;
                    info!(
                        method = %endpoint.method,
                        path = %endpoint.path,
                        description = %endpoint.description,
                        "Endpoint registered"
                    );
                }
            }
            #[cfg(feature = "grpc")]
            ServiceKind::Grpc(service) => {
                let routes = service
                    .grpc_routes()
                    .ok_or_else(|| FlareError::no_endpoints(scope::RUNTIME))?;
                listener.add_grpc_routes(routes)?;
                info!(service = %info.name, "gRPC routes registered");
            }
        }

        if !listener.is_registered(HEALTH_PATH, &Method::GET) {
            listener.register(HEALTH_PATH, Method::GET, self.health.handler())?;
        }

        if info.dev_mode {
            let path = format!("/apidefine/{}.api", info.name);
            listener.register(&path, Method::GET, text_handler(self.service.base().api_define()))?;
            listener.add_first_filter("/*", access_log_filter());
            info!(path = %path, "Dev mode: api define and access log enabled");
        }
        Ok(())
    }

    /// 启动
    ///
    /// 先启动服务后台任务，再启动监听器；配置了服务发现时，等端口可连接后再注册。
    /// 注册失败时返回错误，调用方应随后调用 [`ServiceRuntime::stop`]。
    pub async fn start(&mut self, cancel: &CancellationToken) -> Result<()> {
        self.expect_state(RuntimeState::EndpointsRegistered, "start")?;
        Self::check_cancelled(cancel, "start")?;

        let info = self
            .service_info
            .clone()
            .ok_or_else(|| FlareError::invalid_state(scope::RUNTIME, "service info missing"))?;

        let service = self.service.clone();
        service
            .base()
            .start()
            .await
            .map_err(|e| FlareError::wrap(ErrorCode::ServiceStartFailed, scope::RUNTIME, e))?;
        self.service_started = true;

        let listener = self
            .listener
            .as_mut()
            .ok_or_else(|| FlareError::invalid_state(scope::RUNTIME, "listener missing"))?;
        let signal = listener.start().await?;
        let local_addr = listener.local_addr();
        self.state = RuntimeState::Listening;
        self.spawn_supervisor(signal);
        self.health.set_serving().await;

        if let Some(registrar) = self.registrar.clone() {
            if self.config.enable_ready_check {
                if let Some(address) = local_addr {
                    wait_for_server_ready(probe_address(address), self.config.ready_check_timeout)
                        .await?;
                }
            }
            let address = self.advertise_address(&info, local_addr);
            registrar.register(&info, &address, cancel).await?;
            self.state = RuntimeState::DiscoveryRegistered;
        }

        self.state = RuntimeState::Running;
        info!(
            service = %info.name,
            address = ?local_addr,
            registered = self.registrar.is_some(),
            "✅ Service running"
        );
        Ok(())
    }

    fn advertise_address(&self, info: &ServiceInfo, local_addr: Option<SocketAddr>) -> String {
        let host = self
            .app_config
            .as_ref()
            .and_then(|c| c.server.advertise_host.clone())
            .unwrap_or_else(|| local_ip().to_string());
        let port = local_addr.map(|a| a.port()).unwrap_or(info.port);
        join_host_port(&host, port)
    }

    fn spawn_supervisor(&mut self, signal: ErrorSignal) {
        let stop = CancellationToken::new();
        let token = stop.clone();
        let on_fatal = self.config.on_fatal.clone();

        let task = tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => {}
                result = signal => {
                    if let Ok(err) = result {
                        error!(error = %err, "❌ Listener terminated unexpectedly");
                        on_fatal(err);
                    }
                }
            }
        });
        self.supervisor = Some(Supervisor { stop, task });
    }

    /// 停止
    ///
    /// 可在任意阶段调用，重复调用无副作用。注销失败只记录日志。
    pub async fn stop(&mut self) {
        if self.state == RuntimeState::Stopped {
            return;
        }
        let previous = std::mem::replace(&mut self.state, RuntimeState::Stopping);
        info!(state = ?previous, "Stopping service runtime");

        self.health.set_not_serving().await;

        if let Some(supervisor) = self.supervisor.take() {
            supervisor.stop.cancel();
            let _ = supervisor.task.await;
        }

        if let Some(registrar) = &self.registrar {
            if let Err(e) = registrar.deregister().await {
                warn!(error = %e, "⚠️ Failed to deregister service");
            }
        }

        if let Some(listener) = self.listener.as_mut() {
            listener.stop().await;
        }

        if self.service_started {
            self.service_started = false;
            if let Err(e) = self.service.base().stop().await {
                warn!(error = %e, "⚠️ Service stop returned error");
            }
        }

        let failed = self.cleanups.run_all();
        if failed > 0 {
            warn!(failed, "Some cleanup callbacks panicked");
        }

        self.state = RuntimeState::Stopped;
        info!("Service runtime stopped");
    }

    /// 初始化、启动，并运行到 Ctrl+C 或 `cancel` 被取消，然后停机
    pub async fn run(mut self, cancel: CancellationToken) -> anyhow::Result<()> {
        self.install_logging = true;

        if let Err(e) = self.init(&cancel).await {
            self.stop().await;
            return Err(anyhow::Error::new(e).context("Service initialization failed"));
        }
        if let Err(e) = self.start(&cancel).await {
            self.stop().await;
            return Err(anyhow::Error::new(e).context("Service start failed"));
        }

        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    warn!(error = %e, "Failed to listen for Ctrl+C");
                }
                info!("Shutdown signal received (Ctrl+C)");
            }
            _ = cancel.cancelled() => {
                info!("Shutdown signal received");
            }
        }

        self.stop().await;
        Ok(())
    }
}
