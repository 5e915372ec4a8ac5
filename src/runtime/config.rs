//! 运行时配置模块

use std::sync::Arc;
use std::time::Duration;
use tracing::error;

use crate::error::FlareError;

/// 监听器运行期间异常退出时的处理函数
pub type FatalHandler = Arc<dyn Fn(FlareError) + Send + Sync>;

/// 运行时配置
#[derive(Clone)]
pub struct RuntimeConfig {
    /// 停止时等待处理中请求的最长时间（默认 5 秒）
    pub shutdown_timeout: Duration,
    /// 就绪检查超时时间（默认 30 秒）
    pub ready_check_timeout: Duration,
    /// 注册服务发现之前是否探测监听端口（默认 true）
    pub enable_ready_check: bool,
    /// 监听器致命错误处理，默认记录日志后以状态码 1 退出进程
    pub on_fatal: FatalHandler,
}

fn exit_on_fatal() -> FatalHandler {
    Arc::new(|err: FlareError| {
        error!(error = %err, "❌ Listener failed, exiting");
        std::process::exit(1);
    })
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            shutdown_timeout: Duration::from_secs(5),
            ready_check_timeout: Duration::from_secs(30),
            enable_ready_check: true,
            on_fatal: exit_on_fatal(),
        }
    }
}

impl RuntimeConfig {
    /// 创建默认配置
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置关闭超时时间
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// 设置就绪检查超时时间
    pub fn with_ready_check_timeout(mut self, timeout: Duration) -> Self {
        self.ready_check_timeout = timeout;
        self
    }

    /// 启用/禁用就绪检查
    pub fn with_ready_check(mut self, enable: bool) -> Self {
        self.enable_ready_check = enable;
        self
    }

    /// 替换致命错误处理
    pub fn with_fatal_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(FlareError) + Send + Sync + 'static,
    {
        self.on_fatal = Arc::new(handler);
        self
    }
}

impl std::fmt::Debug for RuntimeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeConfig")
            .field("shutdown_timeout", &self.shutdown_timeout)
            .field("ready_check_timeout", &self.ready_check_timeout)
            .field("enable_ready_check", &self.enable_ready_check)
            .finish_non_exhaustive()
    }
}
