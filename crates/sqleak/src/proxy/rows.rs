use crate::driver::{
    ColumnTypeDatabaseTypeName, ColumnTypeLength, ColumnTypeNullable, ColumnTypePrecisionScale,
    Rows, RowsNextResultSet, Value,
};
use crate::error::{DriverError, DriverResult};
use crate::monitor::{LeakConfig, Monitor, ResourceKind};
use async_trait::async_trait;

/// A monitored result cursor (reported as `Rows`).
pub struct LeakRows {
    inner: Box<dyn Rows>,
    monitor: Monitor,
}

impl LeakRows {
    /// Wrap `inner` and start watching it.
    pub fn new(inner: Box<dyn Rows>, config: &LeakConfig) -> Self {
        Self {
            inner,
            monitor: Monitor::start(ResourceKind::Rows, config),
        }
    }

    /// The leak monitor for this cursor.
    pub fn monitor(&self) -> &Monitor {
        &self.monitor
    }
}

#[async_trait]
impl Rows for LeakRows {
    fn columns(&self) -> Vec<String> {
        self.inner.columns()
    }

    async fn close(&mut self) -> DriverResult<()> {
        self.monitor.mark_closed();
        self.inner.close().await
    }

    async fn next(&mut self, dest: &mut [Value]) -> DriverResult<bool> {
        self.inner.next(dest).await
    }

    fn as_next_result_set(&mut self) -> Option<&mut dyn RowsNextResultSet> {
        Some(self)
    }

    fn as_column_type_database_type_name(&self) -> Option<&dyn ColumnTypeDatabaseTypeName> {
        Some(self)
    }

    fn as_column_type_length(&self) -> Option<&dyn ColumnTypeLength> {
        Some(self)
    }

    fn as_column_type_nullable(&self) -> Option<&dyn ColumnTypeNullable> {
        Some(self)
    }

    fn as_column_type_precision_scale(&self) -> Option<&dyn ColumnTypePrecisionScale> {
        Some(self)
    }
}

#[async_trait]
impl RowsNextResultSet for LeakRows {
    fn has_next_result_set(&mut self) -> bool {
        self.inner
            .as_next_result_set()
            .is_some_and(|rows| rows.has_next_result_set())
    }

    async fn next_result_set(&mut self) -> DriverResult<()> {
        match self.inner.as_next_result_set() {
            Some(rows) => rows.next_result_set().await,
            None => Err(DriverError::NoMoreResultSets),
        }
    }
}

impl ColumnTypeDatabaseTypeName for LeakRows {
    fn column_type_database_type_name(&self, index: usize) -> String {
        self.inner
            .as_column_type_database_type_name()
            .map(|rows| rows.column_type_database_type_name(index))
            .unwrap_or_default()
    }
}

impl ColumnTypeLength for LeakRows {
    fn column_type_length(&self, index: usize) -> Option<u64> {
        self.inner
            .as_column_type_length()
            .and_then(|rows| rows.column_type_length(index))
    }
}

impl ColumnTypeNullable for LeakRows {
    fn column_type_nullable(&self, index: usize) -> Option<bool> {
        self.inner
            .as_column_type_nullable()
            .and_then(|rows| rows.column_type_nullable(index))
    }
}

impl ColumnTypePrecisionScale for LeakRows {
    fn column_type_precision_scale(&self, index: usize) -> Option<(u64, u64)> {
        self.inner
            .as_column_type_precision_scale()
            .and_then(|rows| rows.column_type_precision_scale(index))
    }
}
