use super::rows::LeakRows;
use super::stmt::LeakStmt;
use super::tx::LeakTx;
use crate::context::Context;
use crate::driver::{
    Conn, ConnBeginTx, ConnPrepareContext, ExecResult, Execer, ExecerContext, IsolationLevel,
    NamedValue, NamedValueChecker, Pinger, Queryer, QueryerContext, Rows, SessionResetter, Stmt, Tx,
    TxOptions, Value,
};
use crate::error::{DriverError, DriverResult};
use crate::monitor::LeakConfig;
use async_trait::async_trait;
use std::sync::Arc;

/// A connection whose statements, cursors and transactions are monitored.
///
/// The connection itself is not monitored; pools keep connections open on
/// purpose. Every optional capability is declared and re-probed on the
/// wrapped connection per call.
pub struct LeakConn {
    inner: Arc<dyn Conn>,
    config: LeakConfig,
}

impl LeakConn {
    /// Wrap a driver connection. Connections themselves are not monitored.
    pub fn new(inner: Box<dyn Conn>, config: LeakConfig) -> Self {
        Self {
            inner: Arc::from(inner),
            config,
        }
    }

    /// The wrapped connection.
    pub fn raw(&self) -> &Arc<dyn Conn> {
        &self.inner
    }

    fn wrap_stmt(&self, stmt: Box<dyn Stmt>) -> Box<dyn Stmt> {
        Box::new(LeakStmt::new(stmt, self.inner.clone(), self.config.clone()))
    }

    fn wrap_rows(&self, rows: Box<dyn Rows>) -> Box<dyn Rows> {
        Box::new(LeakRows::new(rows, &self.config))
    }

    fn wrap_tx(&self, tx: Box<dyn Tx>) -> Box<dyn Tx> {
        Box::new(LeakTx::new(tx, &self.config))
    }
}

/// Named value check at connection level: the wrapped connection's checker,
/// or `Skip` when it has none.
pub(super) fn check_conn_named_value(conn: &dyn Conn, value: &mut NamedValue) -> DriverResult<()> {
    match conn.as_named_value_checker() {
        Some(checker) => checker.check_named_value(value),
        None => Err(DriverError::Skip),
    }
}

#[async_trait]
impl Conn for LeakConn {
    async fn prepare(&self, query: &str) -> DriverResult<Box<dyn Stmt>> {
        let stmt = self.inner.prepare(query).await?;
        Ok(self.wrap_stmt(stmt))
    }

    async fn close(&self) -> DriverResult<()> {
        self.inner.close().await
    }

    async fn begin(&self) -> DriverResult<Box<dyn Tx>> {
        let tx = self.inner.begin().await?;
        Ok(self.wrap_tx(tx))
    }

    fn as_pinger(&self) -> Option<&dyn Pinger> {
        Some(self)
    }

    fn as_execer(&self) -> Option<&dyn Execer> {
        Some(self)
    }

    fn as_execer_context(&self) -> Option<&dyn ExecerContext> {
        Some(self)
    }

    fn as_queryer(&self) -> Option<&dyn Queryer> {
        Some(self)
    }

    fn as_queryer_context(&self) -> Option<&dyn QueryerContext> {
        Some(self)
    }

    fn as_prepare_context(&self) -> Option<&dyn ConnPrepareContext> {
        Some(self)
    }

    fn as_begin_tx(&self) -> Option<&dyn ConnBeginTx> {
        Some(self)
    }

    fn as_session_resetter(&self) -> Option<&dyn SessionResetter> {
        Some(self)
    }

    fn as_named_value_checker(&self) -> Option<&dyn NamedValueChecker> {
        Some(self)
    }
}

#[async_trait]
impl Pinger for LeakConn {
    async fn ping(&self, ctx: &Context) -> DriverResult<()> {
        match self.inner.as_pinger() {
            Some(pinger) => pinger.ping(ctx).await,
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Execer for LeakConn {
    async fn exec(&self, query: &str, args: &[Value]) -> DriverResult<ExecResult> {
        match self.inner.as_execer() {
            Some(execer) => execer.exec(query, args).await,
            None => Err(DriverError::Skip),
        }
    }
}

#[async_trait]
impl ExecerContext for LeakConn {
    async fn exec_context(
        &self,
        ctx: &Context,
        query: &str,
        args: &[NamedValue],
    ) -> DriverResult<ExecResult> {
        match self.inner.as_execer_context() {
            Some(execer) => execer.exec_context(ctx, query, args).await,
            None => Err(DriverError::Skip),
        }
    }
}

#[async_trait]
impl Queryer for LeakConn {
    async fn query(&self, query: &str, args: &[Value]) -> DriverResult<Box<dyn Rows>> {
        let Some(queryer) = self.inner.as_queryer() else {
            return Err(DriverError::Skip);
        };
        let rows = queryer.query(query, args).await?;
        Ok(self.wrap_rows(rows))
    }
}

#[async_trait]
impl QueryerContext for LeakConn {
    async fn query_context(
        &self,
        ctx: &Context,
        query: &str,
        args: &[NamedValue],
    ) -> DriverResult<Box<dyn Rows>> {
        let Some(queryer) = self.inner.as_queryer_context() else {
            return Err(DriverError::Skip);
        };
        let rows = queryer.query_context(ctx, query, args).await?;
        Ok(self.wrap_rows(rows))
    }
}

#[async_trait]
impl ConnPrepareContext for LeakConn {
    async fn prepare_context(&self, ctx: &Context, query: &str) -> DriverResult<Box<dyn Stmt>> {
        let stmt = match self.inner.as_prepare_context() {
            Some(preparer) => preparer.prepare_context(ctx, query).await?,
            None => {
                let stmt = self.inner.prepare(query).await?;
                // Polled once; cancellation during prepare() is not observed.
                if let Err(err) = ctx.check() {
                    let _ = stmt.close().await;
                    return Err(err);
                }
                stmt
            }
        };
        Ok(self.wrap_stmt(stmt))
    }
}

#[async_trait]
impl ConnBeginTx for LeakConn {
    async fn begin_tx(&self, ctx: &Context, opts: TxOptions) -> DriverResult<Box<dyn Tx>> {
        if let Some(begin) = self.inner.as_begin_tx() {
            let tx = begin.begin_tx(ctx, opts).await?;
            return Ok(self.wrap_tx(tx));
        }

        // Plain begin() cannot honor non-default options.
        if opts.isolation != IsolationLevel::Default {
            return Err(DriverError::UnsupportedIsolation);
        }
        if opts.read_only {
            return Err(DriverError::ReadOnlyUnsupported);
        }

        let tx = self.inner.begin().await?;
        Ok(self.wrap_tx(tx))
    }
}

#[async_trait]
impl SessionResetter for LeakConn {
    async fn reset_session(&self, ctx: &Context) -> DriverResult<()> {
        match self.inner.as_session_resetter() {
            Some(resetter) => resetter.reset_session(ctx).await,
            None => Ok(()),
        }
    }
}

impl NamedValueChecker for LeakConn {
    fn check_named_value(&self, value: &mut NamedValue) -> DriverResult<()> {
        check_conn_named_value(&*self.inner, value)
    }
}
