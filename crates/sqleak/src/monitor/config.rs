use super::scheduler::{Scheduler, TokioScheduler};
use super::stack::StackPool;
use super::tracing_reporter::TracingReporter;
use super::types::LeakReporter;
use crate::driver::Driver;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Default leak threshold.
pub const DEFAULT_LEAK_TIMEOUT: Duration = Duration::from_secs(30);

/// Maps the driver being wrapped, e.g. to layer another instrumentation wrapper.
pub type DriverTransform = Arc<dyn Fn(Arc<dyn Driver>) -> Arc<dyn Driver> + Send + Sync>;

/// Configuration for leak detection.
///
/// Captured once when the root proxy is built and cloned into every proxy
/// and monitor below it.
#[derive(Clone)]
pub struct LeakConfig {
    /// How long a resource may stay open before it is reported.
    pub timeout: Duration,
    /// Applied once to the driver at wrap time.
    pub driver_transform: Option<DriverTransform>,
    pub(crate) reporter: Arc<dyn LeakReporter>,
    pub(crate) scheduler: Arc<dyn Scheduler>,
    pub(crate) stack_pool: Arc<StackPool>,
}

impl Default for LeakConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_LEAK_TIMEOUT,
            driver_transform: None,
            reporter: Arc::new(TracingReporter::default()),
            scheduler: Arc::new(TokioScheduler),
            stack_pool: StackPool::global(),
        }
    }
}

impl fmt::Debug for LeakConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LeakConfig")
            .field("timeout", &self.timeout)
            .field("driver_transform", &self.driver_transform.is_some())
            .field("stack_buffer_size", &self.stack_pool.buffer_size())
            .finish_non_exhaustive()
    }
}

impl LeakConfig {
    /// Create a configuration with defaults (30s timeout, tracing output).
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the leak threshold.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Transform the wrapped driver before the proxy takes ownership of it.
    pub fn with_driver_transform<F>(mut self, transform: F) -> Self
    where
        F: Fn(Arc<dyn Driver>) -> Arc<dyn Driver> + Send + Sync + 'static,
    {
        self.driver_transform = Some(Arc::new(transform));
        self
    }

    /// Set where leak reports go.
    pub fn with_reporter<R: LeakReporter + 'static>(mut self, reporter: R) -> Self {
        self.reporter = Arc::new(reporter);
        self
    }

    /// Set where leak reports go, from an Arc.
    pub fn with_reporter_arc(mut self, reporter: Arc<dyn LeakReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Set how deferred checks are scheduled.
    pub fn with_scheduler<S: Scheduler + 'static>(mut self, scheduler: S) -> Self {
        self.scheduler = Arc::new(scheduler);
        self
    }

    /// Use a dedicated stack buffer pool instead of the global one.
    pub fn with_stack_pool(mut self, pool: Arc<StackPool>) -> Self {
        self.stack_pool = pool;
        self
    }

    /// The stack buffer pool in use.
    pub fn stack_pool(&self) -> &Arc<StackPool> {
        &self.stack_pool
    }

    pub(crate) fn transform(&self, driver: Arc<dyn Driver>) -> Arc<dyn Driver> {
        match &self.driver_transform {
            Some(transform) => transform(driver),
            None => driver,
        }
    }
}
