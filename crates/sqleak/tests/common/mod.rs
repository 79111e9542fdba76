#![allow(dead_code)]

//! An in-memory driver for integration tests.
//!
//! Every query returns the rows configured on [`MemState`]; every exec
//! reports one affected row. Optional capabilities are switched on per test
//! through [`Caps`].

use async_trait::async_trait;
use parking_lot::Mutex;
use sqleak::driver::*;
use sqleak::{Context, DriverError, DriverResult, LeakConfig, LeakReport};
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Which optional capabilities the driver advertises.
#[derive(Debug, Clone, Copy, Default)]
pub struct Caps {
    pub connector: bool,
    /// Context-aware prepare/exec/query/begin at connection and statement level.
    pub context: bool,
    /// Exec/query without prepare.
    pub fast_path: bool,
    pub ping: bool,
    pub session_reset: bool,
    pub multi_result_sets: bool,
    /// Connection-level checker that doubles integers.
    pub conn_checker: bool,
    /// Statement-level checker that skips every value.
    pub stmt_checker: bool,
}

impl Caps {
    /// Mandatory methods only.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn all() -> Self {
        Self {
            connector: true,
            context: true,
            fast_path: true,
            ping: true,
            session_reset: true,
            multi_result_sets: true,
            conn_checker: true,
            stmt_checker: false,
        }
    }
}

/// Shared bookkeeping for one driver instance.
#[derive(Default)]
pub struct MemState {
    pub rows: Mutex<Vec<Vec<Value>>>,
    pub opened: AtomicUsize,
    pub closed: AtomicUsize,
    pub resets: AtomicUsize,
    /// Arguments received by every exec, in order.
    pub exec_args: Mutex<Vec<Vec<Value>>>,
}

impl MemState {
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn resets(&self) -> usize {
        self.resets.load(Ordering::SeqCst)
    }

    pub fn exec_args(&self) -> Vec<Vec<Value>> {
        self.exec_args.lock().clone()
    }
}

#[derive(Clone)]
pub struct MemDriver {
    pub caps: Caps,
    pub state: Arc<MemState>,
}

impl MemDriver {
    pub fn new(caps: Caps) -> Self {
        let state = MemState::default();
        *state.rows.lock() = vec![
            vec![Value::Int(1), Value::Text("ada".into())],
            vec![Value::Int(2), Value::Text("grace".into())],
        ];
        Self {
            caps,
            state: Arc::new(state),
        }
    }

    fn conn(&self) -> Box<dyn Conn> {
        self.state.opened.fetch_add(1, Ordering::SeqCst);
        Box::new(MemConn(self.clone()))
    }
}

#[async_trait]
impl Driver for MemDriver {
    async fn open(&self, _name: &str) -> DriverResult<Box<dyn Conn>> {
        Ok(self.conn())
    }

    fn as_driver_context(&self) -> Option<&dyn DriverContext> {
        self.caps.connector.then_some(self as &dyn DriverContext)
    }
}

#[async_trait]
impl DriverContext for MemDriver {
    async fn open_connector(&self, _name: &str) -> DriverResult<Box<dyn Connector>> {
        Ok(Box::new(MemConnector(self.clone())))
    }
}

struct MemConnector(MemDriver);

#[async_trait]
impl Connector for MemConnector {
    async fn connect(&self, ctx: &Context) -> DriverResult<Box<dyn Conn>> {
        ctx.check()?;
        Ok(self.0.conn())
    }

    fn driver(&self) -> Arc<dyn Driver> {
        Arc::new(self.0.clone())
    }
}

struct MemConn(MemDriver);

impl MemConn {
    fn caps(&self) -> Caps {
        self.0.caps
    }

    fn rows(&self) -> Box<dyn Rows> {
        Box::new(MemRows::new(&self.0))
    }

    fn record_exec(&self, args: Vec<Value>) -> ExecResult {
        self.0.state.exec_args.lock().push(args);
        ExecResult {
            last_insert_id: None,
            rows_affected: 1,
        }
    }
}

#[async_trait]
impl Conn for MemConn {
    async fn prepare(&self, query: &str) -> DriverResult<Box<dyn Stmt>> {
        if query.trim().is_empty() {
            return Err(DriverError::other("empty query"));
        }
        Ok(Box::new(MemStmt(MemConn(self.0.clone()))))
    }

    async fn close(&self) -> DriverResult<()> {
        self.0.state.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn begin(&self) -> DriverResult<Box<dyn Tx>> {
        Ok(Box::new(MemTx))
    }

    fn as_pinger(&self) -> Option<&dyn Pinger> {
        self.caps().ping.then_some(self as &dyn Pinger)
    }

    fn as_execer(&self) -> Option<&dyn Execer> {
        self.caps().fast_path.then_some(self as &dyn Execer)
    }

    fn as_execer_context(&self) -> Option<&dyn ExecerContext> {
        (self.caps().fast_path && self.caps().context).then_some(self as &dyn ExecerContext)
    }

    fn as_queryer(&self) -> Option<&dyn Queryer> {
        self.caps().fast_path.then_some(self as &dyn Queryer)
    }

    fn as_queryer_context(&self) -> Option<&dyn QueryerContext> {
        (self.caps().fast_path && self.caps().context).then_some(self as &dyn QueryerContext)
    }

    fn as_prepare_context(&self) -> Option<&dyn ConnPrepareContext> {
        self.caps().context.then_some(self as &dyn ConnPrepareContext)
    }

    fn as_begin_tx(&self) -> Option<&dyn ConnBeginTx> {
        self.caps().context.then_some(self as &dyn ConnBeginTx)
    }

    fn as_session_resetter(&self) -> Option<&dyn SessionResetter> {
        self.caps().session_reset.then_some(self as &dyn SessionResetter)
    }

    fn as_named_value_checker(&self) -> Option<&dyn NamedValueChecker> {
        self.caps().conn_checker.then_some(self as &dyn NamedValueChecker)
    }
}

#[async_trait]
impl Pinger for MemConn {
    async fn ping(&self, ctx: &Context) -> DriverResult<()> {
        ctx.check()
    }
}

#[async_trait]
impl Execer for MemConn {
    async fn exec(&self, _query: &str, args: &[Value]) -> DriverResult<ExecResult> {
        Ok(self.record_exec(args.to_vec()))
    }
}

#[async_trait]
impl ExecerContext for MemConn {
    async fn exec_context(
        &self,
        ctx: &Context,
        _query: &str,
        args: &[NamedValue],
    ) -> DriverResult<ExecResult> {
        ctx.check()?;
        Ok(self.record_exec(args.iter().map(|a| a.value.clone()).collect()))
    }
}

#[async_trait]
impl Queryer for MemConn {
    async fn query(&self, _query: &str, _args: &[Value]) -> DriverResult<Box<dyn Rows>> {
        Ok(self.rows())
    }
}

#[async_trait]
impl QueryerContext for MemConn {
    async fn query_context(
        &self,
        ctx: &Context,
        _query: &str,
        _args: &[NamedValue],
    ) -> DriverResult<Box<dyn Rows>> {
        ctx.check()?;
        Ok(self.rows())
    }
}

#[async_trait]
impl ConnPrepareContext for MemConn {
    async fn prepare_context(&self, ctx: &Context, query: &str) -> DriverResult<Box<dyn Stmt>> {
        ctx.check()?;
        self.prepare(query).await
    }
}

#[async_trait]
impl ConnBeginTx for MemConn {
    async fn begin_tx(&self, ctx: &Context, _opts: TxOptions) -> DriverResult<Box<dyn Tx>> {
        ctx.check()?;
        Ok(Box::new(MemTx))
    }
}

#[async_trait]
impl SessionResetter for MemConn {
    async fn reset_session(&self, _ctx: &Context) -> DriverResult<()> {
        self.0.state.resets.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl NamedValueChecker for MemConn {
    fn check_named_value(&self, value: &mut NamedValue) -> DriverResult<()> {
        match value.value {
            Value::Int(n) => {
                value.value = Value::Int(n * 2);
                Ok(())
            }
            _ => Err(DriverError::Skip),
        }
    }
}

struct MemStmt(MemConn);

#[async_trait]
impl Stmt for MemStmt {
    async fn close(&self) -> DriverResult<()> {
        Ok(())
    }

    fn num_input(&self) -> Option<usize> {
        None
    }

    async fn exec(&self, args: &[Value]) -> DriverResult<ExecResult> {
        Ok(self.0.record_exec(args.to_vec()))
    }

    async fn query(&self, _args: &[Value]) -> DriverResult<Box<dyn Rows>> {
        Ok(self.0.rows())
    }

    fn as_exec_context(&self) -> Option<&dyn StmtExecContext> {
        self.0.caps().context.then_some(self as &dyn StmtExecContext)
    }

    fn as_query_context(&self) -> Option<&dyn StmtQueryContext> {
        self.0.caps().context.then_some(self as &dyn StmtQueryContext)
    }

    fn as_named_value_checker(&self) -> Option<&dyn NamedValueChecker> {
        self.0.caps().stmt_checker.then_some(self as &dyn NamedValueChecker)
    }
}

impl NamedValueChecker for MemStmt {
    fn check_named_value(&self, _value: &mut NamedValue) -> DriverResult<()> {
        Err(DriverError::Skip)
    }
}

#[async_trait]
impl StmtExecContext for MemStmt {
    async fn exec_context(&self, ctx: &Context, args: &[NamedValue]) -> DriverResult<ExecResult> {
        ctx.check()?;
        Ok(self
            .0
            .record_exec(args.iter().map(|a| a.value.clone()).collect()))
    }
}

#[async_trait]
impl StmtQueryContext for MemStmt {
    async fn query_context(
        &self,
        ctx: &Context,
        _args: &[NamedValue],
    ) -> DriverResult<Box<dyn Rows>> {
        ctx.check()?;
        Ok(self.0.rows())
    }
}

struct MemRows {
    multi: bool,
    /// Result sets not yet started, each a full copy of the table.
    pending_sets: usize,
    current: std::vec::IntoIter<Vec<Value>>,
    table: Vec<Vec<Value>>,
}

impl MemRows {
    fn new(driver: &MemDriver) -> Self {
        let table = driver.state.rows.lock().clone();
        Self {
            multi: driver.caps.multi_result_sets,
            pending_sets: 1,
            current: table.clone().into_iter(),
            table,
        }
    }
}

#[async_trait]
impl Rows for MemRows {
    fn columns(&self) -> Vec<String> {
        vec!["id".to_string(), "name".to_string()]
    }

    async fn close(&mut self) -> DriverResult<()> {
        Ok(())
    }

    async fn next(&mut self, dest: &mut [Value]) -> DriverResult<bool> {
        let Some(row) = self.current.next() else {
            return Ok(false);
        };
        for (slot, value) in dest.iter_mut().zip(row) {
            *slot = value;
        }
        Ok(true)
    }

    fn as_next_result_set(&mut self) -> Option<&mut dyn RowsNextResultSet> {
        if self.multi { Some(self) } else { None }
    }
}

#[async_trait]
impl RowsNextResultSet for MemRows {
    fn has_next_result_set(&mut self) -> bool {
        self.pending_sets > 0
    }

    async fn next_result_set(&mut self) -> DriverResult<()> {
        if self.pending_sets == 0 {
            return Err(DriverError::NoMoreResultSets);
        }
        self.pending_sets -= 1;
        self.current = self.table.clone().into_iter();
        Ok(())
    }
}

struct MemTx;

#[async_trait]
impl Tx for MemTx {
    async fn commit(&self) -> DriverResult<()> {
        Ok(())
    }

    async fn rollback(&self) -> DriverResult<()> {
        Ok(())
    }
}

// ── Leak capture ──

/// Leak lines collected by a closure reporter.
#[derive(Clone, Default)]
pub struct Leaks(Arc<Mutex<Vec<String>>>);

impl Leaks {
    pub fn lines(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    /// A config with `timeout` that reports into this collector.
    pub fn config(&self, timeout: Duration) -> LeakConfig {
        let sink = self.0.clone();
        LeakConfig::new()
            .with_timeout(timeout)
            .with_reporter(move |leak: &LeakReport<'_>| sink.lock().push(leak.to_string()))
    }
}

/// In-memory writer for `tracing_subscriber::fmt`.
#[derive(Clone, Default)]
pub struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }
}

impl io::Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for SharedBuf {
    type Writer = SharedBuf;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// A plain-text subscriber writing into `buf`.
pub fn capture_subscriber(buf: &SharedBuf) -> impl tracing::Subscriber + Send + Sync + 'static {
    tracing_subscriber::fmt()
        .with_ansi(false)
        .with_writer(buf.clone())
        .finish()
}
