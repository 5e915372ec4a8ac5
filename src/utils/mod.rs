//! 工具函数模块

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};
use tracing::debug;

use crate::error::{FlareError, Result, scope};

/// 拆分 `host:port`，支持 `[::1]:8080` 形式的 IPv6 地址
pub fn split_host_port(address: &str) -> Result<(String, u16)> {
    let invalid = || {
        FlareError::invalid_address(
            scope::CONFIG,
            format!("'{}' is not a valid host:port address", address),
        )
    };

    let (host, port) = address.rsplit_once(':').ok_or_else(invalid)?;
    let host = match host.strip_prefix('[') {
        Some(rest) => rest.strip_suffix(']').ok_or_else(invalid)?,
        None if host.contains(':') => return Err(invalid()),
        None => host,
    };
    let port: u16 = port.parse().map_err(|_| invalid())?;
    if port == 0 {
        return Err(invalid());
    }
    Ok((host.to_string(), port))
}

/// 拼接 `host:port`
pub fn join_host_port(host: &str, port: u16) -> String {
    if host.contains(':') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}

/// 拨号地址中的逻辑服务名
///
/// `user-service:80` 得到 `user-service`；没有端口时原样返回。
pub fn logical_name(address: &str) -> &str {
    match address.rsplit_once(':') {
        Some((name, port)) if !name.is_empty() && port.parse::<u16>().is_ok() => name,
        _ => address,
    }
}

/// 本机对外 IP
///
/// 通过 UDP connect 让内核选出路由源地址，不发送任何数据包；失败时回退到 127.0.0.1。
pub fn local_ip() -> IpAddr {
    UdpSocket::bind("0.0.0.0:0")
        .and_then(|socket| {
            socket.connect("8.8.8.8:80")?;
            socket.local_addr()
        })
        .map(|addr| addr.ip())
        .ok()
        .filter(|ip| !ip.is_unspecified())
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

/// 监听地址对应的本地探测地址，`0.0.0.0` / `::` 替换为回环地址
pub fn probe_address(bound: SocketAddr) -> SocketAddr {
    match bound.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => {
            SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), bound.port())
        }
        IpAddr::V6(ip) if ip.is_unspecified() => {
            SocketAddr::new(IpAddr::V6(Ipv6Addr::LOCALHOST), bound.port())
        }
        _ => bound,
    }
}

/// 等待服务启动就绪（通过 TCP 连接重试）
///
/// 使用指数退避策略重试连接，直到服务真正可以接受连接，或超过 `total_timeout`。
pub async fn wait_for_server_ready(address: SocketAddr, total_timeout: Duration) -> Result<()> {
    const INITIAL_DELAY_MS: u64 = 20;
    const MAX_DELAY_MS: u64 = 500;

    let start = std::time::Instant::now();
    let mut delay_ms = INITIAL_DELAY_MS;
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        match timeout(Duration::from_millis(100), TcpStream::connect(address)).await {
            Ok(Ok(_)) => {
                debug!(
                    address = %address,
                    attempts = attempt,
                    elapsed_ms = start.elapsed().as_millis(),
                    "Server is ready"
                );
                return Ok(());
            }
            Ok(Err(e)) => {
                debug!(address = %address, attempt, error = %e, "Connection attempt failed, retrying...");
            }
            Err(_) => {
                debug!(address = %address, attempt, "Connection attempt timed out, retrying...");
            }
        }

        if start.elapsed() >= total_timeout {
            return Err(FlareError::new(
                crate::error::ErrorCode::Timeout,
                scope::RUNTIME,
                format!(
                    "server {} not ready after {} attempts ({:?})",
                    address, attempt, total_timeout
                ),
            ));
        }

        sleep(Duration::from_millis(delay_ms)).await;
        delay_ms = (delay_ms * 2).min(MAX_DELAY_MS);
    }
}
