use super::conn::check_conn_named_value;
use super::rows::LeakRows;
use crate::context::Context;
use crate::driver::{
    Conn, ExecResult, NamedValue, NamedValueChecker, Rows, Stmt, StmtExecContext,
    StmtQueryContext, Value, named_values_to_values,
};
use crate::error::DriverResult;
use crate::monitor::{LeakConfig, Monitor, ResourceKind};
use async_trait::async_trait;
use std::sync::Arc;

/// A monitored prepared statement (reported as `Stmt`).
pub struct LeakStmt {
    inner: Box<dyn Stmt>,
    conn: Arc<dyn Conn>,
    monitor: Monitor,
    config: LeakConfig,
}

impl LeakStmt {
    /// Wrap `inner`, prepared on the wrapped connection `conn`.
    pub fn new(inner: Box<dyn Stmt>, conn: Arc<dyn Conn>, config: LeakConfig) -> Self {
        Self {
            inner,
            conn,
            monitor: Monitor::start(ResourceKind::Stmt, &config),
            config,
        }
    }

    /// The leak monitor for this statement.
    pub fn monitor(&self) -> &Monitor {
        &self.monitor
    }

    fn wrap_rows(&self, rows: Box<dyn Rows>) -> Box<dyn Rows> {
        Box::new(LeakRows::new(rows, &self.config))
    }
}

#[async_trait]
impl Stmt for LeakStmt {
    async fn close(&self) -> DriverResult<()> {
        self.monitor.mark_closed();
        self.inner.close().await
    }

    fn num_input(&self) -> Option<usize> {
        self.inner.num_input()
    }

    async fn exec(&self, args: &[Value]) -> DriverResult<ExecResult> {
        self.inner.exec(args).await
    }

    async fn query(&self, args: &[Value]) -> DriverResult<Box<dyn Rows>> {
        let rows = self.inner.query(args).await?;
        Ok(self.wrap_rows(rows))
    }

    fn as_exec_context(&self) -> Option<&dyn StmtExecContext> {
        Some(self)
    }

    fn as_query_context(&self) -> Option<&dyn StmtQueryContext> {
        Some(self)
    }

    fn as_named_value_checker(&self) -> Option<&dyn NamedValueChecker> {
        Some(self)
    }
}

// Context-aware calls may not answer Skip, so without native support they
// fall back to the positional methods after a single poll of `ctx`.

#[async_trait]
impl StmtExecContext for LeakStmt {
    async fn exec_context(&self, ctx: &Context, args: &[NamedValue]) -> DriverResult<ExecResult> {
        if let Some(execer) = self.inner.as_exec_context() {
            return execer.exec_context(ctx, args).await;
        }

        let values = named_values_to_values(args)?;
        ctx.check()?;
        self.inner.exec(&values).await
    }
}

#[async_trait]
impl StmtQueryContext for LeakStmt {
    async fn query_context(
        &self,
        ctx: &Context,
        args: &[NamedValue],
    ) -> DriverResult<Box<dyn Rows>> {
        let rows = match self.inner.as_query_context() {
            Some(queryer) => queryer.query_context(ctx, args).await?,
            None => {
                let values = named_values_to_values(args)?;
                ctx.check()?;
                self.inner.query(&values).await?
            }
        };
        Ok(self.wrap_rows(rows))
    }
}

impl NamedValueChecker for LeakStmt {
    fn check_named_value(&self, value: &mut NamedValue) -> DriverResult<()> {
        match self.inner.as_named_value_checker() {
            Some(checker) => checker.check_named_value(value),
            // Callers stop at the first checker they find, and this proxy
            // always declares one, so the connection level is consulted here.
            None => check_conn_named_value(&*self.conn, value),
        }
    }
}
