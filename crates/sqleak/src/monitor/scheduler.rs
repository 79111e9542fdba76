use std::sync::OnceLock;
use std::time::Duration;

use tokio::runtime::{Builder, Handle};

/// A one-shot task run by a [`Scheduler`].
pub type DeferredTask = Box<dyn FnOnce() + Send + 'static>;

/// Runs a task once after a delay, off the caller's control flow.
///
/// Implementations must not block the caller and must not panic.
pub trait Scheduler: Send + Sync {
    /// Run `task` once, no earlier than `delay` from now.
    fn schedule(&self, delay: Duration, task: DeferredTask);
}

/// Schedules on a process-wide timer: a current-thread tokio runtime with
/// time enabled, driven by a single `sqleak-monitor` thread.
///
/// The timer does not depend on the caller's runtime, so checks fire the same
/// way from async code, from runtimes built without `enable_time()`, and from
/// plain threads.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioScheduler;

impl Scheduler for TokioScheduler {
    fn schedule(&self, delay: Duration, task: DeferredTask) {
        match timer() {
            Some(handle) => {
                handle.spawn(async move {
                    tokio::time::sleep(delay).await;
                    task();
                });
            }
            // Dropping the task returns its buffer to the pool.
            None => tracing::debug!(target: "sqleak", "leak check dropped: no timer"),
        }
    }
}

static TIMER: OnceLock<Option<Handle>> = OnceLock::new();

/// The shared timer's handle, started on first use.
fn timer() -> Option<&'static Handle> {
    TIMER.get_or_init(start_timer).as_ref()
}

fn start_timer() -> Option<Handle> {
    let runtime = match Builder::new_current_thread().enable_time().build() {
        Ok(runtime) => runtime,
        Err(err) => {
            tracing::debug!(target: "sqleak", error = %err, "failed to build leak check timer");
            return None;
        }
    };
    let handle = runtime.handle().clone();

    let spawned = std::thread::Builder::new()
        .name("sqleak-monitor".to_string())
        .spawn(move || runtime.block_on(std::future::pending::<()>()));
    match spawned {
        Ok(_) => Some(handle),
        Err(err) => {
            tracing::debug!(target: "sqleak", error = %err, "failed to start leak check timer");
            None
        }
    }
}
