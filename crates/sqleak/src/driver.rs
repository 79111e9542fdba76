//! Pluggable driver interface.
//!
//! A driver implements the mandatory traits ([`Driver`], [`Conn`], [`Stmt`],
//! [`Rows`], [`Tx`]) and may implement any of the optional capability traits.
//! Optional capabilities are discovered through the `as_*` probes on the
//! mandatory traits, which default to `None`. A driver advertises a capability
//! by overriding the probe to return `Some(self)`:
//!
//! ```ignore
//! #[async_trait]
//! impl Conn for MyConn {
//!     // mandatory methods ...
//!
//!     fn as_pinger(&self) -> Option<&dyn Pinger> {
//!         Some(self)
//!     }
//! }
//! ```
//!
//! Fast-path capabilities (exec/query without prepare, named value checks)
//! may return [`DriverError::Skip`] to ask the caller to use the mandatory path.

use crate::context::Context;
use crate::error::{DriverError, DriverResult};
use async_trait::async_trait;
use std::sync::Arc;

/// A value passed to or read from a driver.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    Timestamp(chrono::NaiveDateTime),
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<chrono::NaiveDateTime> for Value {
    fn from(v: chrono::NaiveDateTime) -> Self {
        Value::Timestamp(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// An argument with its (1-based) position and optional parameter name.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedValue {
    pub name: Option<String>,
    pub ordinal: usize,
    pub value: Value,
}

impl NamedValue {
    /// A positional argument.
    pub fn positional(ordinal: usize, value: impl Into<Value>) -> Self {
        Self {
            name: None,
            ordinal,
            value: value.into(),
        }
    }

    /// A named argument.
    pub fn named(name: impl Into<String>, ordinal: usize, value: impl Into<Value>) -> Self {
        Self {
            name: Some(name.into()),
            ordinal,
            value: value.into(),
        }
    }
}

/// Build positional arguments from plain values.
pub fn positional_args<I, V>(values: I) -> Vec<NamedValue>
where
    I: IntoIterator<Item = V>,
    V: Into<Value>,
{
    values
        .into_iter()
        .enumerate()
        .map(|(i, v)| NamedValue::positional(i + 1, v))
        .collect()
}

/// Strip argument names for drivers that only take positional values.
///
/// Fails if any argument is named.
pub fn named_values_to_values(args: &[NamedValue]) -> DriverResult<Vec<Value>> {
    args.iter()
        .map(|arg| match &arg.name {
            Some(name) if !name.is_empty() => Err(DriverError::NamedParametersUnsupported),
            _ => Ok(arg.value.clone()),
        })
        .collect()
}

/// Transaction isolation level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IsolationLevel {
    #[default]
    Default,
    ReadUncommitted,
    ReadCommitted,
    WriteCommitted,
    RepeatableRead,
    Snapshot,
    Serializable,
    Linearizable,
}

/// Options for [`ConnBeginTx::begin_tx`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TxOptions {
    pub isolation: IsolationLevel,
    pub read_only: bool,
}

impl TxOptions {
    /// Default isolation, read-write.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the isolation level.
    pub fn isolation(mut self, level: IsolationLevel) -> Self {
        self.isolation = level;
        self
    }

    /// Request a read-only transaction.
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Whether a plain `begin()` satisfies these options.
    pub fn is_default(&self) -> bool {
        self.isolation == IsolationLevel::Default && !self.read_only
    }
}

/// Outcome of an exec call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecResult {
    pub last_insert_id: Option<i64>,
    pub rows_affected: u64,
}

// ── Driver level ──

/// Entry point of a driver: opens connections by data source name.
#[async_trait]
pub trait Driver: Send + Sync {
    async fn open(&self, name: &str) -> DriverResult<Box<dyn Conn>>;

    fn as_driver_context(&self) -> Option<&dyn DriverContext> {
        None
    }
}

/// Optional: parse the data source name once and hand out a [`Connector`].
#[async_trait]
pub trait DriverContext: Send + Sync {
    async fn open_connector(&self, name: &str) -> DriverResult<Box<dyn Connector>>;
}

/// A fixed configuration able to open any number of connections.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, ctx: &Context) -> DriverResult<Box<dyn Conn>>;

    fn driver(&self) -> Arc<dyn Driver>;

    fn as_closer(&self) -> Option<&dyn ConnectorCloser> {
        None
    }
}

/// Optional: release resources held by a connector.
#[async_trait]
pub trait ConnectorCloser: Send + Sync {
    async fn close(&self) -> DriverResult<()>;
}

// ── Connection level ──

/// A single session with the database.
#[async_trait]
pub trait Conn: Send + Sync {
    async fn prepare(&self, query: &str) -> DriverResult<Box<dyn Stmt>>;

    async fn close(&self) -> DriverResult<()>;

    async fn begin(&self) -> DriverResult<Box<dyn Tx>>;

    fn as_pinger(&self) -> Option<&dyn Pinger> {
        None
    }

    fn as_execer(&self) -> Option<&dyn Execer> {
        None
    }

    fn as_execer_context(&self) -> Option<&dyn ExecerContext> {
        None
    }

    fn as_queryer(&self) -> Option<&dyn Queryer> {
        None
    }

    fn as_queryer_context(&self) -> Option<&dyn QueryerContext> {
        None
    }

    fn as_prepare_context(&self) -> Option<&dyn ConnPrepareContext> {
        None
    }

    fn as_begin_tx(&self) -> Option<&dyn ConnBeginTx> {
        None
    }

    fn as_session_resetter(&self) -> Option<&dyn SessionResetter> {
        None
    }

    fn as_named_value_checker(&self) -> Option<&dyn NamedValueChecker> {
        None
    }
}

#[async_trait]
pub trait Pinger: Send + Sync {
    async fn ping(&self, ctx: &Context) -> DriverResult<()>;
}

/// Exec without prepare. May return [`DriverError::Skip`].
#[async_trait]
pub trait Execer: Send + Sync {
    async fn exec(&self, query: &str, args: &[Value]) -> DriverResult<ExecResult>;
}

/// Context-aware exec without prepare. May return [`DriverError::Skip`].
#[async_trait]
pub trait ExecerContext: Send + Sync {
    async fn exec_context(
        &self,
        ctx: &Context,
        query: &str,
        args: &[NamedValue],
    ) -> DriverResult<ExecResult>;
}

/// Query without prepare. May return [`DriverError::Skip`].
#[async_trait]
pub trait Queryer: Send + Sync {
    async fn query(&self, query: &str, args: &[Value]) -> DriverResult<Box<dyn Rows>>;
}

/// Context-aware query without prepare. May return [`DriverError::Skip`].
#[async_trait]
pub trait QueryerContext: Send + Sync {
    async fn query_context(
        &self,
        ctx: &Context,
        query: &str,
        args: &[NamedValue],
    ) -> DriverResult<Box<dyn Rows>>;
}

#[async_trait]
pub trait ConnPrepareContext: Send + Sync {
    async fn prepare_context(&self, ctx: &Context, query: &str) -> DriverResult<Box<dyn Stmt>>;
}

#[async_trait]
pub trait ConnBeginTx: Send + Sync {
    async fn begin_tx(&self, ctx: &Context, opts: TxOptions) -> DriverResult<Box<dyn Tx>>;
}

/// Called before a pooled connection is reused.
#[async_trait]
pub trait SessionResetter: Send + Sync {
    async fn reset_session(&self, ctx: &Context) -> DriverResult<()>;
}

/// Validate and convert an argument in place. May return [`DriverError::Skip`].
pub trait NamedValueChecker: Send + Sync {
    fn check_named_value(&self, value: &mut NamedValue) -> DriverResult<()>;
}

// ── Statement level ──

/// A prepared statement.
#[async_trait]
pub trait Stmt: Send + Sync {
    async fn close(&self) -> DriverResult<()>;

    /// Number of placeholders, or `None` if the driver does not know.
    fn num_input(&self) -> Option<usize>;

    async fn exec(&self, args: &[Value]) -> DriverResult<ExecResult>;

    async fn query(&self, args: &[Value]) -> DriverResult<Box<dyn Rows>>;

    fn as_exec_context(&self) -> Option<&dyn StmtExecContext> {
        None
    }

    fn as_query_context(&self) -> Option<&dyn StmtQueryContext> {
        None
    }

    fn as_named_value_checker(&self) -> Option<&dyn NamedValueChecker> {
        None
    }
}

/// Context-aware statement exec. Must not return [`DriverError::Skip`].
#[async_trait]
pub trait StmtExecContext: Send + Sync {
    async fn exec_context(&self, ctx: &Context, args: &[NamedValue]) -> DriverResult<ExecResult>;
}

/// Context-aware statement query. Must not return [`DriverError::Skip`].
#[async_trait]
pub trait StmtQueryContext: Send + Sync {
    async fn query_context(
        &self,
        ctx: &Context,
        args: &[NamedValue],
    ) -> DriverResult<Box<dyn Rows>>;
}

// ── Cursor level ──

/// An iterator over query results.
#[async_trait]
pub trait Rows: Send {
    fn columns(&self) -> Vec<String>;

    async fn close(&mut self) -> DriverResult<()>;

    /// Fill `dest` with the next row. Returns `false` once exhausted.
    async fn next(&mut self, dest: &mut [Value]) -> DriverResult<bool>;

    fn as_next_result_set(&mut self) -> Option<&mut dyn RowsNextResultSet> {
        None
    }

    fn as_column_type_database_type_name(&self) -> Option<&dyn ColumnTypeDatabaseTypeName> {
        None
    }

    fn as_column_type_length(&self) -> Option<&dyn ColumnTypeLength> {
        None
    }

    fn as_column_type_nullable(&self) -> Option<&dyn ColumnTypeNullable> {
        None
    }

    fn as_column_type_precision_scale(&self) -> Option<&dyn ColumnTypePrecisionScale> {
        None
    }
}

#[async_trait]
pub trait RowsNextResultSet: Send {
    fn has_next_result_set(&mut self) -> bool;

    /// Advance to the next result set, or [`DriverError::NoMoreResultSets`].
    async fn next_result_set(&mut self) -> DriverResult<()>;
}

pub trait ColumnTypeDatabaseTypeName {
    fn column_type_database_type_name(&self, index: usize) -> String;
}

pub trait ColumnTypeLength {
    fn column_type_length(&self, index: usize) -> Option<u64>;
}

pub trait ColumnTypeNullable {
    fn column_type_nullable(&self, index: usize) -> Option<bool>;
}

pub trait ColumnTypePrecisionScale {
    /// `(precision, scale)` for decimal columns.
    fn column_type_precision_scale(&self, index: usize) -> Option<(u64, u64)>;
}

// ── Transaction level ──

#[async_trait]
pub trait Tx: Send + Sync {
    async fn commit(&self) -> DriverResult<()>;

    async fn rollback(&self) -> DriverResult<()>;
}
