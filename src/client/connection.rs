use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;

use crate::balancer::ConnectionGuard;

/// 通过 [`BalancedDialer`](super::BalancedDialer) 建立的连接
///
/// 存活期间在负载均衡器上占用一个连接计数。
#[derive(Debug)]
pub struct BalancedConnection {
    stream: TcpStream,
    guard: ConnectionGuard,
}

impl BalancedConnection {
    pub(crate) fn new(stream: TcpStream, guard: ConnectionGuard) -> Self {
        Self { stream, guard }
    }

    /// 实际连接的后端地址
    pub fn backend(&self) -> SocketAddr {
        self.guard.address()
    }

    pub fn stream(&self) -> &TcpStream {
        &self.stream
    }

    /// 取出底层连接，同时归还连接计数
    pub fn into_inner(self) -> TcpStream {
        self.stream
    }
}

impl AsyncRead for BalancedConnection {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stream).poll_read(cx, buf)
    }
}

impl AsyncWrite for BalancedConnection {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.stream).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stream).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stream).poll_shutdown(cx)
    }

    fn poll_write_vectored(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[io::IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.stream).poll_write_vectored(cx, bufs)
    }

    fn is_write_vectored(&self) -> bool {
        self.stream.is_write_vectored()
    }
}
