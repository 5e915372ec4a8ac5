//! 负载均衡拨号器
//!
//! 把 `service-name:port` 形式的拨号地址解析为逻辑服务名，交给负载均衡器
//! 选出具体后端后建立 TCP 连接。连接失败时换一个后端重试一次。

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpSocket, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{BalancedConnection, DialerBuilder, DialerConfig};
use crate::balancer::{Balancer, ConnectionGuard};
use crate::config::Config;
use crate::error::{ErrorCode, FlareError, Result, scope};
use crate::utils::logical_name;

enum ConnectFailure {
    Cancelled,
    Io(io::Error),
}

pub struct BalancedDialer {
    balancer: Arc<dyn Balancer>,
    config: DialerConfig,
}

impl BalancedDialer {
    pub fn new(balancer: Arc<dyn Balancer>, config: DialerConfig) -> Self {
        Self { balancer, config }
    }

    /// 使用配置文件 `[client]` 段的参数
    pub fn from_config(balancer: Arc<dyn Balancer>, config: &Config) -> Self {
        Self::new(balancer, config.client.clone())
    }

    pub fn builder(balancer: Arc<dyn Balancer>) -> DialerBuilder {
        DialerBuilder::new(balancer)
    }

    pub fn config(&self) -> &DialerConfig {
        &self.config
    }

    /// 拨号到 `address` 对应的服务
    ///
    /// `network` 只支持 `tcp`、`tcp4`、`tcp6`。`cancel` 被取消时立即返回取消错误。
    pub async fn dial(
        &self,
        cancel: &CancellationToken,
        network: &str,
        address: &str,
    ) -> Result<BalancedConnection> {
        if !matches!(network, "tcp" | "tcp4" | "tcp6") {
            return Err(FlareError::new(
                ErrorCode::UnsupportedNetwork,
                scope::DIALER,
                format!("unsupported network '{}'", network),
            ));
        }

        let service_name = logical_name(address);
        let max_attempts = self.config.max_attempts.max(1);
        let mut tried: Vec<SocketAddr> = Vec::with_capacity(max_attempts);
        let mut last_error: Option<io::Error> = None;

        for attempt in 1..=max_attempts {
            if cancel.is_cancelled() {
                return Err(Self::cancelled(service_name));
            }
            if attempt > 1 && self.balancer.candidate_count(service_name) <= 1 {
                break;
            }

            let backend = match self.balancer.select_excluding(service_name, &tried) {
                Ok(backend) => backend,
                Err(err) if attempt == 1 => return Err(err),
                Err(_) => break,
            };
            tried.push(backend);

            match self.connect(cancel, backend).await {
                Ok(stream) => {
                    debug!(service = %service_name, backend = %backend, attempt, "Dialed backend");
                    let guard = ConnectionGuard::new(self.balancer.clone(), backend);
                    return Ok(BalancedConnection::new(stream, guard));
                }
                Err(ConnectFailure::Cancelled) => return Err(Self::cancelled(service_name)),
                Err(ConnectFailure::Io(e)) => {
                    warn!(
                        service = %service_name,
                        backend = %backend,
                        attempt,
                        error = %e,
                        "Dial attempt failed"
                    );
                    last_error = Some(e);
                }
            }
        }

        let cause = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no backend attempted".to_string());
        Err(FlareError::new(
            ErrorCode::DialFailed,
            scope::DIALER,
            format!(
                "dial {} failed after {} attempt(s): {}",
                service_name,
                tried.len(),
                cause
            ),
        ))
    }

    async fn connect(
        &self,
        cancel: &CancellationToken,
        backend: SocketAddr,
    ) -> std::result::Result<TcpStream, ConnectFailure> {
        let socket = if backend.is_ipv4() {
            TcpSocket::new_v4()
        } else {
            TcpSocket::new_v6()
        }
        .map_err(ConnectFailure::Io)?;
        if self.config.keep_alive {
            socket.set_keepalive(true).map_err(ConnectFailure::Io)?;
        }

        let timeout = self.config.connect_timeout();
        let stream = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ConnectFailure::Cancelled),
            result = tokio::time::timeout(timeout, socket.connect(backend)) => match result {
                Ok(Ok(stream)) => stream,
                Ok(Err(e)) => return Err(ConnectFailure::Io(e)),
                Err(_) => {
                    return Err(ConnectFailure::Io(io::Error::new(
                        io::ErrorKind::TimedOut,
                        format!("connect to {} timed out after {:?}", backend, timeout),
                    )));
                }
            },
        };

        if self.config.nodelay {
            stream.set_nodelay(true).map_err(ConnectFailure::Io)?;
        }
        Ok(stream)
    }

    fn cancelled(service_name: &str) -> FlareError {
        FlareError::cancelled(scope::DIALER, format!("dial {} cancelled", service_name))
    }
}

impl std::fmt::Debug for BalancedDialer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BalancedDialer")
            .field("config", &self.config)
            .finish()
    }
}
