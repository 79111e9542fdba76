//! Leak monitors for statements, cursors and transactions.
//!
//! Every resource handed out by a proxy owns one [`Monitor`]. On creation the
//! monitor captures the caller's stack and schedules a one-shot check after
//! the configured timeout. If the resource has not been closed by then, the
//! check hands a [`LeakReport`] to the configured [`LeakReporter`]:
//!
//! ```text
//! likely resource leak detected: Rows not closed within 100ms after opening:
//!    0: sqleak::monitor::Monitor::start
//!    ...
//! ```
//!
//! The check is best-effort: a close racing with the deadline may or may not
//! suppress the report. Monitors never return errors and never block.

mod config;
mod scheduler;
mod stack;
mod tracing_reporter;
mod types;


pub use config::{DEFAULT_LEAK_TIMEOUT, DriverTransform, LeakConfig};
pub use scheduler::{DeferredTask, Scheduler, TokioScheduler};
pub use stack::{DEFAULT_STACK_BUFFER_SIZE, StackBuffer, StackPool};
pub use tracing_reporter::TracingReporter;
pub use types::{LeakReport, LeakReporter, ResourceKind};

use std::backtrace::Backtrace;
use std::fmt::Write as _;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Leak detection state attached to one resource proxy.
#[derive(Debug)]
pub struct Monitor {
    state: Arc<MonitorState>,
}

#[derive(Debug)]
struct MonitorState {
    kind: ResourceKind,
    timeout: Duration,
    closed: AtomicBool,
}

impl Monitor {
    /// Capture the current stack and schedule the deferred check.
    pub fn start(kind: ResourceKind, config: &LeakConfig) -> Self {
        let state = Arc::new(MonitorState {
            kind,
            timeout: config.timeout,
            closed: AtomicBool::new(false),
        });

        let check = DeferredCheck {
            state: state.clone(),
            backtrace: Backtrace::force_capture(),
            buffer: Some(config.stack_pool.acquire()),
            pool: config.stack_pool.clone(),
            reporter: config.reporter.clone(),
            dispatch: tracing::dispatcher::get_default(|dispatch| dispatch.clone()),
        };
        config
            .scheduler
            .schedule(config.timeout, Box::new(move || check.run()));

        Self { state }
    }

    /// Record that the resource was released. Idempotent.
    pub fn mark_closed(&self) {
        self.state.closed.store(true, Ordering::Release);
    }

    /// Whether [`mark_closed`](Self::mark_closed) has been called.
    pub fn is_closed(&self) -> bool {
        self.state.closed.load(Ordering::Acquire)
    }

    /// The kind of resource being watched.
    pub fn kind(&self) -> ResourceKind {
        self.state.kind
    }

    /// How long after opening the check runs.
    pub fn timeout(&self) -> Duration {
        self.state.timeout
    }
}

struct DeferredCheck {
    state: Arc<MonitorState>,
    backtrace: Backtrace,
    buffer: Option<StackBuffer>,
    pool: Arc<StackPool>,
    reporter: Arc<dyn LeakReporter>,
    dispatch: tracing::Dispatch,
}

impl DeferredCheck {
    fn run(mut self) {
        if self.state.closed.load(Ordering::Acquire) {
            return;
        }
        let Some(buffer) = self.buffer.as_mut() else {
            return;
        };

        // A full buffer stops formatting; keep what fits.
        let _ = write!(buffer, "{}", self.backtrace);

        let report = LeakReport {
            kind: self.state.kind,
            timeout: self.state.timeout,
            stack: buffer.as_str(),
        };
        let reporter = &self.reporter;
        let _ = panic::catch_unwind(AssertUnwindSafe(|| {
            tracing::dispatcher::with_default(&self.dispatch, || reporter.report(&report));
        }));
    }
}

impl Drop for DeferredCheck {
    // Runs after the check fires, or when a scheduler discards the task.
    fn drop(&mut self) {
        if let Some(buffer) = self.buffer.take() {
            self.pool.release(buffer);
        }
    }
}
