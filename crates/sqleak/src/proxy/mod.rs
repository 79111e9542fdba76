//! Leak-monitoring proxies for every driver resource level.
//!
//! Each proxy owns the wrapped object and forwards every mandatory and
//! optional call to it. Child resources (statements, cursors, transactions)
//! are wrapped with a fresh [`Monitor`](crate::monitor::Monitor) before they
//! are returned.
//!
//! Proxies declare every optional capability of their level so callers that
//! probe them see the capability as present; each call then re-probes the
//! wrapped object and either delegates or falls back:
//!
//! | Call | Fallback when the wrapped object lacks it |
//! |------|-------------------------------------------|
//! | ping, reset session, connector close | `Ok(())` |
//! | exec/query without prepare, named value check | [`DriverError::Skip`](crate::DriverError::Skip) |
//! | prepare/exec/query with context | mandatory method after one `Context::check()` |
//! | begin with options | `begin()` for default options, else an unsupported-option error |
//! | column introspection | `""` / `None` |
//! | next result set | `false` / [`DriverError::NoMoreResultSets`](crate::DriverError::NoMoreResultSets) |

mod conn;
mod driver;
mod rows;
mod stmt;
mod tx;


pub use conn::LeakConn;
pub use driver::{DsnConnector, LeakConnector, LeakDriver};
pub use rows::LeakRows;
pub use stmt::LeakStmt;
pub use tx::LeakTx;
