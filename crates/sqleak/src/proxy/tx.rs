use crate::driver::Tx;
use crate::error::DriverResult;
use crate::monitor::{LeakConfig, Monitor, ResourceKind};
use async_trait::async_trait;

/// A monitored transaction (reported as `Tx`).
///
/// Commit and rollback both count as closing; the wrapped transaction decides
/// whether a second call is an error.
pub struct LeakTx {
    inner: Box<dyn Tx>,
    monitor: Monitor,
}

impl LeakTx {
    /// Wrap `inner` and start watching it.
    pub fn new(inner: Box<dyn Tx>, config: &LeakConfig) -> Self {
        Self {
            inner,
            monitor: Monitor::start(ResourceKind::Tx, config),
        }
    }

    /// The leak monitor for this transaction.
    pub fn monitor(&self) -> &Monitor {
        &self.monitor
    }
}

#[async_trait]
impl Tx for LeakTx {
    async fn commit(&self) -> DriverResult<()> {
        self.monitor.mark_closed();
        self.inner.commit().await
    }

    async fn rollback(&self) -> DriverResult<()> {
        self.monitor.mark_closed();
        self.inner.rollback().await
    }
}
