//! 服务注册器
//!
//! 管理本实例在服务发现中的注册状态：
//!
//! ```text
//! Unregistered -> Registering -> Registered -> Deregistering -> Unregistered
//! ```
//!
//! 注册失败时状态回到调用前的值。注册和注销互斥执行。

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::discovery::DiscoveryConfig;
use crate::discovery::backend::DiscoveryBackend;
use crate::discovery::registration::RegistrationRecord;
use crate::error::{ErrorCode, FlareError, Result, scope};
use crate::types::ServiceInfo;

/// 注册状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationState {
    Unregistered,
    Registering,
    Registered,
    Deregistering,
}

struct Inner {
    state: RegistrationState,
    record: Option<RegistrationRecord>,
}

pub struct ServiceRegistrar {
    backend: Arc<dyn DiscoveryBackend>,
    check_interval: Duration,
    deregister_critical_after: Option<Duration>,
    inner: Mutex<Inner>,
    op_lock: tokio::sync::Mutex<()>,
}

impl ServiceRegistrar {
    pub fn new(backend: Arc<dyn DiscoveryBackend>) -> Self {
        Self::with_config(backend, &DiscoveryConfig::default())
    }

    pub fn with_config(backend: Arc<dyn DiscoveryBackend>, config: &DiscoveryConfig) -> Self {
        Self {
            backend,
            check_interval: config.check_interval(),
            deregister_critical_after: config.deregister_critical_after(),
            inner: Mutex::new(Inner {
                state: RegistrationState::Unregistered,
                record: None,
            }),
            op_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn backend(&self) -> &Arc<dyn DiscoveryBackend> {
        &self.backend
    }

    pub fn state(&self) -> RegistrationState {
        self.lock_inner().state
    }

    /// 当前注册记录
    pub fn record(&self) -> Option<RegistrationRecord> {
        self.lock_inner().record.clone()
    }

    pub fn service_id(&self) -> Option<String> {
        self.lock_inner().record.as_ref().map(|r| r.service_id.clone())
    }

    fn lock_inner(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: RegistrationState) -> RegistrationState {
        let mut inner = self.lock_inner();
        std::mem::replace(&mut inner.state, state)
    }

    /// 以 `address`（`host:port`）向服务发现注册本实例
    ///
    /// 只尝试一次，不重试。同名同地址的重复注册会覆盖之前的记录；
    /// 已用其他地址注册时先注销旧记录。
    pub async fn register(
        &self,
        info: &ServiceInfo,
        address: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let _op = self.op_lock.lock().await;

        let record = RegistrationRecord::build(
            info,
            address,
            self.check_interval,
            self.deregister_critical_after,
        )?;

        // 地址变化时先注销旧记录，避免留下无人清理的实例
        let stale = self
            .lock_inner()
            .record
            .as_ref()
            .filter(|r| r.service_id != record.service_id)
            .map(|r| r.service_id.clone());
        if let Some(stale_id) = stale {
            self.backend.deregister_service(&stale_id).await.map_err(|e| {
                FlareError::new(
                    ErrorCode::DeregistrationFailed,
                    scope::REGISTRAR,
                    format!("deregister previous {} failed: {}", stale_id, e.message()),
                )
            })?;
            info!(service_id = %stale_id, "Previous registration removed");
            let mut inner = self.lock_inner();
            inner.state = RegistrationState::Unregistered;
            inner.record = None;
        }

        let previous = self.set_state(RegistrationState::Registering);
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(FlareError::cancelled(
                scope::REGISTRAR,
                format!("registration of {} cancelled", record.service_id),
            )),
            result = self.backend.register_service(&record) => result.map_err(|e| {
                FlareError::registration_failed(scope::REGISTRAR, e.message())
            }),
        };

        match result {
            Ok(()) => {
                info!(
                    service_id = %record.service_id,
                    check = %record.check.url,
                    "✅ Service registered"
                );
                let mut inner = self.lock_inner();
                inner.state = RegistrationState::Registered;
                inner.record = Some(record);
                Ok(())
            }
            Err(err) => {
                warn!(service_id = %record.service_id, error = %err, "Service registration failed");
                self.set_state(previous);
                Err(err)
            }
        }
    }

    /// 从服务发现注销本实例
    ///
    /// 从未注册过时什么也不做。注销失败时保留注册记录，可以再次尝试。
    pub async fn deregister(&self) -> Result<()> {
        let _op = self.op_lock.lock().await;

        let Some(service_id) = self.service_id() else {
            return Ok(());
        };

        let previous = self.set_state(RegistrationState::Deregistering);
        match self.backend.deregister_service(&service_id).await {
            Ok(()) => {
                info!(service_id = %service_id, "Service deregistered");
                let mut inner = self.lock_inner();
                inner.state = RegistrationState::Unregistered;
                inner.record = None;
                Ok(())
            }
            Err(err) => {
                self.set_state(previous);
                Err(FlareError::new(
                    ErrorCode::DeregistrationFailed,
                    scope::REGISTRAR,
                    format!("deregister {} failed: {}", service_id, err.message()),
                ))
            }
        }
    }
}

impl std::fmt::Debug for ServiceRegistrar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock_inner();
        f.debug_struct("ServiceRegistrar")
            .field("state", &inner.state)
            .field("record", &inner.record)
            .finish()
    }
}
