use super::conn::LeakConn;
use crate::context::Context;
use crate::driver::{Conn, Connector, ConnectorCloser, Driver, DriverContext};
use crate::error::DriverResult;
use crate::monitor::LeakConfig;
use async_trait::async_trait;
use std::sync::Arc;

/// A driver whose connections hand out leak-monitored resources.
///
/// Cloning is cheap; clones share the wrapped driver.
#[derive(Clone)]
pub struct LeakDriver {
    inner: Arc<dyn Driver>,
    config: LeakConfig,
}

impl std::fmt::Debug for LeakDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LeakDriver")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl LeakDriver {
    /// Wrap `driver`, applying the configured driver transform first.
    ///
    /// The original driver is not modified.
    pub fn new(driver: Arc<dyn Driver>, config: LeakConfig) -> Self {
        Self {
            inner: config.transform(driver),
            config,
        }
    }

    /// The configuration propagated to every monitor.
    pub fn config(&self) -> &LeakConfig {
        &self.config
    }

    /// The wrapped (possibly transformed) driver.
    pub fn inner(&self) -> &Arc<dyn Driver> {
        &self.inner
    }
}

#[async_trait]
impl Driver for LeakDriver {
    async fn open(&self, name: &str) -> DriverResult<Box<dyn Conn>> {
        let conn = self.inner.open(name).await?;
        Ok(Box::new(LeakConn::new(conn, self.config.clone())))
    }

    fn as_driver_context(&self) -> Option<&dyn DriverContext> {
        Some(self)
    }
}

#[async_trait]
impl DriverContext for LeakDriver {
    async fn open_connector(&self, name: &str) -> DriverResult<Box<dyn Connector>> {
        match self.inner.as_driver_context() {
            Some(driver) => {
                let connector = driver.open_connector(name).await?;
                Ok(Box::new(LeakConnector::new(connector, self.clone())))
            }
            // Plain drivers get a connector that re-opens through this proxy.
            None => Ok(Box::new(DsnConnector::new(name, Arc::new(self.clone())))),
        }
    }
}

/// Wraps a driver's connector so every connection it makes is monitored.
pub struct LeakConnector {
    inner: Box<dyn Connector>,
    driver: LeakDriver,
}

impl LeakConnector {
    /// Wrap a native connector; `driver` is the proxy it reports as.
    pub fn new(inner: Box<dyn Connector>, driver: LeakDriver) -> Self {
        Self { inner, driver }
    }
}

#[async_trait]
impl Connector for LeakConnector {
    async fn connect(&self, ctx: &Context) -> DriverResult<Box<dyn Conn>> {
        let conn = self.inner.connect(ctx).await?;
        Ok(Box::new(LeakConn::new(conn, self.driver.config.clone())))
    }

    fn driver(&self) -> Arc<dyn Driver> {
        Arc::new(self.driver.clone())
    }

    // Declared unconditionally: callers probe the proxy, not the wrapped connector.
    fn as_closer(&self) -> Option<&dyn ConnectorCloser> {
        Some(self)
    }
}

#[async_trait]
impl ConnectorCloser for LeakConnector {
    async fn close(&self) -> DriverResult<()> {
        match self.inner.as_closer() {
            Some(closer) => closer.close().await,
            None => Ok(()),
        }
    }
}

/// A connector for drivers without their own: opens `dsn` on every connect.
pub struct DsnConnector {
    dsn: String,
    driver: Arc<dyn Driver>,
}

impl DsnConnector {
    /// A connector that opens `dsn` through `driver` on every connect.
    pub fn new(dsn: impl Into<String>, driver: Arc<dyn Driver>) -> Self {
        Self {
            dsn: dsn.into(),
            driver,
        }
    }
}

#[async_trait]
impl Connector for DsnConnector {
    async fn connect(&self, _ctx: &Context) -> DriverResult<Box<dyn Conn>> {
        self.driver.open(&self.dsn).await
    }

    fn driver(&self) -> Arc<dyn Driver> {
        self.driver.clone()
    }
}
