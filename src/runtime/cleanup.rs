//! 停机清理回调

use std::panic::{AssertUnwindSafe, catch_unwind};
use tracing::{debug, error};

type CleanFn = Box<dyn FnOnce() + Send>;

/// 按注册顺序执行的清理回调
///
/// 每个回调最多执行一次；某个回调 panic 不影响后续回调。
#[derive(Default)]
pub struct CleanupRegistry {
    callbacks: Vec<(String, CleanFn)>,
}

impl CleanupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.callbacks.push((name.into(), Box::new(f)));
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    /// 执行并清空所有回调，返回 panic 的回调数
    pub fn run_all(&mut self) -> usize {
        let mut failed = 0;
        for (name, callback) in self.callbacks.drain(..) {
            match catch_unwind(AssertUnwindSafe(callback)) {
                Ok(()) => debug!(cleanup = %name, "Cleanup callback finished"),
                Err(panic) => {
                    failed += 1;
                    let reason = panic
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".to_string());
                    error!(cleanup = %name, reason = %reason, "Cleanup callback panicked");
                }
            }
        }
        failed
    }
}

impl std::fmt::Debug for CleanupRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.callbacks.iter().map(|(name, _)| name.as_str()).collect();
        f.debug_struct("CleanupRegistry").field("callbacks", &names).finish()
    }
}
