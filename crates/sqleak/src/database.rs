//! A small database handle over a [`Connector`].
//!
//! `Database` keeps a handful of idle connections and runs the usual driver
//! call protocol: try the context-aware fast path, then the plain fast path,
//! then prepare + execute, treating [`DriverError::Skip`] as "try the next
//! one". Arguments are checked by the statement's checker, or by the
//! connection's when the statement has none; a skipped value is accepted as is.
//!
//! It stands in for a full pooling client: no retries, no connection limits,
//! no lifetime management.
//!
//! # Example
//!
//! ```ignore
//! let db = sqleak::open("mem", "test", LeakConfig::new())?;
//! let ctx = Context::background();
//!
//! db.exec(&ctx, "CREATE TABLE t (id INTEGER)", &[]).await?;
//!
//! let mut rows = db.query(&ctx, "SELECT id FROM t", &[]).await?;
//! while let Some(row) = rows.next().await? {
//!     println!("{row:?}");
//! }
//! rows.close().await?;
//! ```

use crate::context::Context;
use crate::driver::{
    Conn, Connector, Driver, ExecResult, IsolationLevel, NamedValue, Rows, Stmt, Tx, TxOptions,
    Value, named_values_to_values,
};
use crate::error::{DriverError, DriverResult};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Idle connections kept by default.
pub const DEFAULT_MAX_IDLE: usize = 2;

/// A handle to a database reached through a connector.
#[derive(Clone)]
pub struct Database {
    inner: Arc<DbInner>,
}

struct DbInner {
    connector: Arc<dyn Connector>,
    idle: Mutex<Vec<Arc<dyn Conn>>>,
    max_idle: AtomicUsize,
    closed: AtomicBool,
}

impl Database {
    /// Create a handle over `connector`. No connection is opened yet.
    pub fn open_db(connector: Box<dyn Connector>) -> Self {
        Self {
            inner: Arc::new(DbInner {
                connector: Arc::from(connector),
                idle: Mutex::new(Vec::new()),
                max_idle: AtomicUsize::new(DEFAULT_MAX_IDLE),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// The driver behind the connector.
    pub fn driver(&self) -> Arc<dyn Driver> {
        self.inner.connector.driver()
    }

    /// Limit the number of idle connections kept for reuse.
    pub fn set_max_idle(&self, max_idle: usize) {
        self.inner.max_idle.store(max_idle, Ordering::Relaxed);
    }

    /// Number of idle connections currently kept.
    pub fn idle_connections(&self) -> usize {
        self.inner.idle.lock().len()
    }

    /// Verify a connection can be established.
    pub async fn ping(&self, ctx: &Context) -> DriverResult<()> {
        let conn = self.inner.acquire(ctx).await?;
        let result = match conn.as_pinger() {
            Some(pinger) => pinger.ping(ctx).await,
            None => Ok(()),
        };
        self.inner.release(conn).await;
        result
    }

    /// Execute a statement that returns no rows.
    pub async fn exec(
        &self,
        ctx: &Context,
        query: &str,
        args: &[NamedValue],
    ) -> DriverResult<ExecResult> {
        let conn = self.inner.acquire(ctx).await?;
        let result = exec_on(&*conn, ctx, query, args).await;
        self.inner.release(conn).await;
        result
    }

    /// Run a query. The connection stays busy until the rows are closed.
    pub async fn query(
        &self,
        ctx: &Context,
        query: &str,
        args: &[NamedValue],
    ) -> DriverResult<DbRows> {
        let conn = self.inner.acquire(ctx).await?;
        match query_on(&*conn, ctx, query, args).await {
            Ok((rows, stmt)) => Ok(DbRows {
                rows,
                stmt,
                lease: Some((self.inner.clone(), conn)),
            }),
            Err(err) => {
                self.inner.release(conn).await;
                Err(err)
            }
        }
    }

    /// Prepare a statement on a dedicated connection.
    pub async fn prepare(&self, ctx: &Context, query: &str) -> DriverResult<DbStmt> {
        let conn = self.inner.acquire(ctx).await?;
        match prepare_on(&*conn, ctx, query).await {
            Ok(stmt) => Ok(DbStmt {
                stmt,
                conn,
                db: Some(self.inner.clone()),
            }),
            Err(err) => {
                self.inner.release(conn).await;
                Err(err)
            }
        }
    }

    /// Begin a transaction on a dedicated connection.
    pub async fn begin(&self, ctx: &Context, opts: TxOptions) -> DriverResult<DbTx> {
        let conn = self.inner.acquire(ctx).await?;
        let result = match conn.as_begin_tx() {
            Some(begin) => begin.begin_tx(ctx, opts).await,
            None if opts.isolation != IsolationLevel::Default => {
                Err(DriverError::UnsupportedIsolation)
            }
            None if opts.read_only => Err(DriverError::ReadOnlyUnsupported),
            None => conn.begin().await,
        };
        match result {
            Ok(tx) => Ok(DbTx {
                tx,
                conn,
                db: self.inner.clone(),
            }),
            Err(err) => {
                self.inner.release(conn).await;
                Err(err)
            }
        }
    }

    /// Close idle connections and the connector. Busy connections are closed
    /// when their rows, statement or transaction finish.
    pub async fn close(&self) -> DriverResult<()> {
        self.inner.closed.store(true, Ordering::Release);
        let idle: Vec<_> = self.inner.idle.lock().drain(..).collect();

        let mut first_err = None;
        for conn in idle {
            if let Err(err) = conn.close().await {
                first_err.get_or_insert(err);
            }
        }
        if let Some(closer) = self.inner.connector.as_closer() {
            if let Err(err) = closer.close().await {
                first_err.get_or_insert(err);
            }
        }

        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl DbInner {
    async fn acquire(&self, ctx: &Context) -> DriverResult<Arc<dyn Conn>> {
        if self.closed.load(Ordering::Acquire) {
            return Err(DriverError::Closed("database"));
        }
        ctx.check()?;

        loop {
            let Some(conn) = self.idle.lock().pop() else {
                break;
            };
            let reset = match conn.as_session_resetter() {
                Some(resetter) => resetter.reset_session(ctx).await,
                None => Ok(()),
            };
            match reset {
                Ok(()) => return Ok(conn),
                Err(err) => {
                    tracing::debug!(target: "sqleak", error = %err, "discarding connection after failed session reset");
                    let _ = conn.close().await;
                }
            }
        }

        let conn = self.connector.connect(ctx).await?;
        Ok(Arc::from(conn))
    }

    async fn release(&self, conn: Arc<dyn Conn>) {
        if !self.closed.load(Ordering::Acquire) {
            let mut idle = self.idle.lock();
            if idle.len() < self.max_idle.load(Ordering::Relaxed) {
                idle.push(conn);
                return;
            }
        }
        if let Err(err) = conn.close().await {
            tracing::debug!(target: "sqleak", error = %err, "error closing connection");
        }
    }
}

/// Rows of a query.
///
/// Rows from [`Database::query`] hold their connection until closed; rows
/// from a statement or transaction share that owner's connection.
pub struct DbRows {
    rows: Box<dyn Rows>,
    stmt: Option<Box<dyn Stmt>>,
    lease: Option<(Arc<DbInner>, Arc<dyn Conn>)>,
}

impl DbRows {
    /// Column names of the current result set.
    pub fn columns(&self) -> Vec<String> {
        self.rows.columns()
    }

    /// The next row, or `None` once the current result set is exhausted.
    pub async fn next(&mut self) -> DriverResult<Option<Vec<Value>>> {
        let mut row = vec![Value::Null; self.rows.columns().len()];
        if self.rows.next(&mut row).await? {
            Ok(Some(row))
        } else {
            Ok(None)
        }
    }

    /// Advance to the next result set. Returns `false` if there is none.
    pub async fn next_result_set(&mut self) -> DriverResult<bool> {
        let Some(rows) = self.rows.as_next_result_set() else {
            return Ok(false);
        };
        if !rows.has_next_result_set() {
            return Ok(false);
        }
        match rows.next_result_set().await {
            Ok(()) => Ok(true),
            Err(DriverError::NoMoreResultSets) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// The driver cursor, for column type introspection.
    pub fn driver_rows(&self) -> &dyn Rows {
        &*self.rows
    }

    /// Close the cursor and its implicit statement, then release the connection.
    pub async fn close(mut self) -> DriverResult<()> {
        let result = self.rows.close().await;
        if let Some(stmt) = self.stmt.take() {
            let _ = stmt.close().await;
        }
        if let Some((db, conn)) = self.lease.take() {
            db.release(conn).await;
        }
        result
    }
}

/// A prepared statement bound to one connection.
pub struct DbStmt {
    stmt: Box<dyn Stmt>,
    conn: Arc<dyn Conn>,
    // Set when the statement owns its connection.
    db: Option<Arc<DbInner>>,
}

impl DbStmt {
    /// Execute the statement with `args`.
    pub async fn exec(&self, ctx: &Context, args: &[NamedValue]) -> DriverResult<ExecResult> {
        stmt_exec(&*self.stmt, &*self.conn, ctx, args).await
    }

    /// Run the statement as a query. The cursor does not own the statement.
    pub async fn query(&self, ctx: &Context, args: &[NamedValue]) -> DriverResult<DbRows> {
        let rows = stmt_query(&*self.stmt, &*self.conn, ctx, args).await?;
        Ok(DbRows {
            rows,
            stmt: None,
            lease: None,
        })
    }

    /// Placeholder count, if the driver knows it.
    pub fn num_input(&self) -> Option<usize> {
        self.stmt.num_input()
    }

    /// Close the statement and return its connection, if it owns one.
    pub async fn close(self) -> DriverResult<()> {
        let Self { stmt, conn, db } = self;
        let result = stmt.close().await;
        if let Some(db) = db {
            db.release(conn).await;
        }
        result
    }
}

/// A transaction bound to one connection.
pub struct DbTx {
    tx: Box<dyn Tx>,
    conn: Arc<dyn Conn>,
    db: Arc<DbInner>,
}

impl DbTx {
    pub async fn exec(
        &self,
        ctx: &Context,
        query: &str,
        args: &[NamedValue],
    ) -> DriverResult<ExecResult> {
        exec_on(&*self.conn, ctx, query, args).await
    }

    pub async fn query(
        &self,
        ctx: &Context,
        query: &str,
        args: &[NamedValue],
    ) -> DriverResult<DbRows> {
        let (rows, stmt) = query_on(&*self.conn, ctx, query, args).await?;
        Ok(DbRows {
            rows,
            stmt,
            lease: None,
        })
    }

    /// Prepare a statement inside the transaction.
    pub async fn prepare(&self, ctx: &Context, query: &str) -> DriverResult<DbStmt> {
        let stmt = prepare_on(&*self.conn, ctx, query).await?;
        Ok(DbStmt {
            stmt,
            conn: self.conn.clone(),
            db: None,
        })
    }

    /// Commit and return the connection.
    pub async fn commit(self) -> DriverResult<()> {
        let result = self.tx.commit().await;
        self.db.release(self.conn).await;
        result
    }

    /// Roll back and return the connection.
    pub async fn rollback(self) -> DriverResult<()> {
        let result = self.tx.rollback().await;
        self.db.release(self.conn).await;
        result
    }

    /// The driver transaction.
    pub fn driver_tx(&self) -> &dyn Tx {
        &*self.tx
    }
}

// ── Call protocol ──

/// Run each argument through the statement's checker if it has one, otherwise
/// the connection's. Only one level is asked: `Skip`, or no checker at all,
/// accepts the value unchanged.
fn check_args(
    conn: &dyn Conn,
    stmt: Option<&dyn Stmt>,
    args: &[NamedValue],
) -> DriverResult<Vec<NamedValue>> {
    if let Some(expected) = stmt.and_then(|s| s.num_input()) {
        if expected != args.len() {
            return Err(DriverError::other(format!(
                "sql: expected {expected} arguments, got {}",
                args.len()
            )));
        }
    }

    let mut checked = args.to_vec();
    let checker = stmt
        .and_then(|s| s.as_named_value_checker())
        .or_else(|| conn.as_named_value_checker());
    let Some(checker) = checker else {
        return Ok(checked);
    };

    for arg in &mut checked {
        match checker.check_named_value(arg) {
            Ok(()) | Err(DriverError::Skip) => {}
            Err(err) => return Err(err),
        }
    }
    Ok(checked)
}

async fn prepare_on(conn: &dyn Conn, ctx: &Context, query: &str) -> DriverResult<Box<dyn Stmt>> {
    match conn.as_prepare_context() {
        Some(preparer) => preparer.prepare_context(ctx, query).await,
        None => {
            ctx.check()?;
            conn.prepare(query).await
        }
    }
}

async fn exec_on(
    conn: &dyn Conn,
    ctx: &Context,
    query: &str,
    args: &[NamedValue],
) -> DriverResult<ExecResult> {
    let fast = if let Some(execer) = conn.as_execer_context() {
        let args = check_args(conn, None, args)?;
        execer.exec_context(ctx, query, &args).await
    } else if let Some(execer) = conn.as_execer() {
        let values = named_values_to_values(&check_args(conn, None, args)?)?;
        ctx.check()?;
        execer.exec(query, &values).await
    } else {
        Err(DriverError::Skip)
    };
    match fast {
        Err(DriverError::Skip) => {}
        other => return other,
    }

    let stmt = prepare_on(conn, ctx, query).await?;
    let result = stmt_exec(&*stmt, conn, ctx, args).await;
    let _ = stmt.close().await;
    result
}

async fn query_on(
    conn: &dyn Conn,
    ctx: &Context,
    query: &str,
    args: &[NamedValue],
) -> DriverResult<(Box<dyn Rows>, Option<Box<dyn Stmt>>)> {
    let fast = if let Some(queryer) = conn.as_queryer_context() {
        let args = check_args(conn, None, args)?;
        queryer.query_context(ctx, query, &args).await
    } else if let Some(queryer) = conn.as_queryer() {
        let values = named_values_to_values(&check_args(conn, None, args)?)?;
        ctx.check()?;
        queryer.query(query, &values).await
    } else {
        Err(DriverError::Skip)
    };
    match fast {
        Err(DriverError::Skip) => {}
        Ok(rows) => return Ok((rows, None)),
        Err(err) => return Err(err),
    }

    let stmt = prepare_on(conn, ctx, query).await?;
    match stmt_query(&*stmt, conn, ctx, args).await {
        Ok(rows) => Ok((rows, Some(stmt))),
        Err(err) => {
            let _ = stmt.close().await;
            Err(err)
        }
    }
}

async fn stmt_exec(
    stmt: &dyn Stmt,
    conn: &dyn Conn,
    ctx: &Context,
    args: &[NamedValue],
) -> DriverResult<ExecResult> {
    let args = check_args(conn, Some(stmt), args)?;
    match stmt.as_exec_context() {
        Some(execer) => execer.exec_context(ctx, &args).await,
        None => {
            let values = named_values_to_values(&args)?;
            ctx.check()?;
            stmt.exec(&values).await
        }
    }
}

async fn stmt_query(
    stmt: &dyn Stmt,
    conn: &dyn Conn,
    ctx: &Context,
    args: &[NamedValue],
) -> DriverResult<Box<dyn Rows>> {
    let args = check_args(conn, Some(stmt), args)?;
    match stmt.as_query_context() {
        Some(queryer) => queryer.query_context(ctx, &args).await,
        None => {
            let values = named_values_to_values(&args)?;
            ctx.check()?;
            stmt.query(&values).await
        }
    }
}
