//! # sqleak
//!
//! Leak detection for database drivers.
//!
//! `sqleak` wraps any driver implementing the [`driver`] traits and watches
//! every statement, cursor and transaction it hands out. A resource that is
//! not closed (or committed / rolled back) within the configured timeout is
//! reported once, together with the stack of the code that opened it:
//!
//! ```text
//! WARN sqleak: likely resource leak detected: Rows not closed within 30s after opening:
//!    0: sqleak::monitor::Monitor::start
//!    1: myapp::orders::load
//!    ...
//! ```
//!
//! Apart from that warning the proxies are transparent: every call, result
//! and error of the wrapped driver is passed through unchanged, and optional
//! capabilities the driver lacks degrade to neutral defaults.
//!
//! ## Opening a database by driver name
//!
//! ```ignore
//! use sqleak::{Context, LeakConfig};
//! use std::time::Duration;
//!
//! sqleak::register("mem", Arc::new(MemDriver::default()))?;
//!
//! let config = LeakConfig::new().with_timeout(Duration::from_secs(5));
//! let db = sqleak::open("mem", "file::memory:", config).await?;
//!
//! let mut rows = db.query(&Context::background(), "SELECT 1", &[]).await?;
//! while let Some(row) = rows.next().await? {
//!     println!("{row:?}");
//! }
//! rows.close().await?;
//! ```
//!
//! ## Wrapping an existing driver
//!
//! ```ignore
//! let driver = sqleak::wrap_driver(Arc::new(MemDriver::default()), LeakConfig::new());
//! sqleak::register("mem-leakcheck", Arc::new(driver))?;
//! ```
//!
//! ## Reporting
//!
//! Leaks are logged with `tracing` at `WARN` on the `sqleak` target by
//! default. Use [`LeakConfig::with_reporter`] to route them elsewhere:
//!
//! ```ignore
//! let config = LeakConfig::new().with_reporter(|leak: &LeakReport<'_>| {
//!     eprintln!("{leak}");
//! });
//! ```

pub mod context;
pub mod database;
pub mod driver;
pub mod error;
pub mod monitor;
pub mod proxy;
pub mod registry;

#[cfg(test)]
mod test_util;

use driver::DriverContext as _;
use std::sync::Arc;

pub use context::{CancelHandle, Context};
pub use database::{Database, DbRows, DbStmt, DbTx};
pub use driver::{
    Conn, Connector, Driver, ExecResult, IsolationLevel, NamedValue, Rows, Stmt, Tx, TxOptions,
    Value, positional_args,
};
pub use error::{ContextError, DriverError, DriverResult};
pub use monitor::{
    DEFAULT_LEAK_TIMEOUT, LeakConfig, LeakReport, LeakReporter, Monitor, ResourceKind, Scheduler,
    StackPool, TokioScheduler, TracingReporter,
};
pub use proxy::{LeakConn, LeakDriver, LeakRows, LeakStmt, LeakTx};
pub use registry::{drivers, lookup, register};

/// Wrap an already constructed driver.
///
/// The returned proxy can be registered under a new name or used directly.
/// `driver` itself is left untouched.
pub fn wrap_driver(driver: Arc<dyn Driver>, config: LeakConfig) -> LeakDriver {
    LeakDriver::new(driver, config)
}

/// Open a database through the registered driver `driver_name`, with leak
/// detection on every resource it hands out.
///
/// Fails with [`DriverError::UnknownDriver`] if no such driver is registered,
/// or with the driver's error if it cannot create a connector for `dsn`. No
/// connection is made until the database is first used.
pub async fn open(driver_name: &str, dsn: &str, config: LeakConfig) -> DriverResult<Database> {
    let driver = wrap_driver(lookup(driver_name)?, config);
    // The proxy always offers a connector, falling back to re-opening by DSN.
    let connector = driver.open_connector(dsn).await?;
    tracing::debug!(target: "sqleak", driver = %driver_name, timeout = ?driver.config().timeout, "opened leak-checked database");
    Ok(Database::open_db(connector))
}
