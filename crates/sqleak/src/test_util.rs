//! Helpers shared by the unit tests.

use crate::monitor::{DeferredTask, LeakConfig, LeakReport, LeakReporter, Scheduler, StackPool};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// Collects rendered leak lines.
#[derive(Default)]
pub(crate) struct Capture(Mutex<Vec<String>>);

impl Capture {
    pub(crate) fn lines(&self) -> Vec<String> {
        self.0.lock().clone()
    }
}

impl LeakReporter for Capture {
    fn report(&self, leak: &LeakReport<'_>) {
        self.0.lock().push(leak.to_string());
    }
}

/// Holds tasks until the test fires them.
#[derive(Default)]
pub(crate) struct ManualScheduler(Mutex<Vec<(Duration, DeferredTask)>>);

impl ManualScheduler {
    pub(crate) fn fire_all(&self) {
        let tasks: Vec<_> = self.0.lock().drain(..).collect();
        for (_, task) in tasks {
            task();
        }
    }

    pub(crate) fn discard_all(&self) {
        self.0.lock().clear();
    }

    pub(crate) fn pending(&self) -> usize {
        self.0.lock().len()
    }

    pub(crate) fn delays(&self) -> Vec<Duration> {
        self.0.lock().iter().map(|(delay, _)| *delay).collect()
    }
}

impl Scheduler for Arc<ManualScheduler> {
    fn schedule(&self, delay: Duration, task: DeferredTask) {
        self.0.lock().push((delay, task));
    }
}

/// A 100ms config with captured reports, manual scheduling and a private pool.
pub(crate) fn manual_config() -> (LeakConfig, Arc<Capture>, Arc<ManualScheduler>, Arc<StackPool>) {
    let capture = Arc::new(Capture::default());
    let scheduler = Arc::new(ManualScheduler::default());
    let pool = Arc::new(StackPool::default());
    let config = LeakConfig::new()
        .with_timeout(Duration::from_millis(100))
        .with_reporter_arc(capture.clone())
        .with_scheduler(scheduler.clone())
        .with_stack_pool(pool.clone());
    (config, capture, scheduler, pool)
}
