//! Cancellation signal passed to context-aware driver calls.

use crate::error::{ContextError, DriverResult};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Notify;

/// A cancellation signal with an optional deadline.
///
/// `Context::background()` is never done. Derived contexts are done once their
/// [`CancelHandle`] fires or their deadline passes.
#[derive(Debug, Clone, Default)]
pub struct Context {
    inner: Option<Arc<ContextInner>>,
}

#[derive(Debug)]
struct ContextInner {
    cancelled: AtomicBool,
    deadline: Option<Instant>,
    notify: Notify,
}

/// Cancels the [`Context`] it was created with.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    inner: Arc<ContextInner>,
}

impl Context {
    /// A context that is never cancelled and has no deadline.
    pub fn background() -> Self {
        Self::default()
    }

    /// A cancellable context.
    pub fn with_cancel() -> (Self, CancelHandle) {
        Self::build(None)
    }

    /// A cancellable context that is also done after `timeout`.
    ///
    /// A timeout too large to represent as an instant means no deadline.
    pub fn with_timeout(timeout: Duration) -> (Self, CancelHandle) {
        Self::build(Instant::now().checked_add(timeout))
    }

    /// A cancellable context that is also done at `deadline`.
    pub fn with_deadline(deadline: Instant) -> (Self, CancelHandle) {
        Self::build(Some(deadline))
    }

    fn build(deadline: Option<Instant>) -> (Self, CancelHandle) {
        let inner = Arc::new(ContextInner {
            cancelled: AtomicBool::new(false),
            deadline,
            notify: Notify::new(),
        });
        (
            Self {
                inner: Some(inner.clone()),
            },
            CancelHandle { inner },
        )
    }

    /// The deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.inner.as_ref().and_then(|inner| inner.deadline)
    }

    /// Why the context is done, or `None` if it is still live.
    ///
    /// Never blocks.
    pub fn err(&self) -> Option<ContextError> {
        let inner = self.inner.as_ref()?;
        if inner.cancelled.load(Ordering::Acquire) {
            return Some(ContextError::Canceled);
        }
        match inner.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(ContextError::DeadlineExceeded),
            _ => None,
        }
    }

    /// Non-blocking poll: `Err` if the context is already done.
    pub fn check(&self) -> DriverResult<()> {
        match self.err() {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }

    /// Wait until the context is done. Pends forever for `background()`.
    pub async fn done(&self) -> ContextError {
        let Some(inner) = &self.inner else {
            return std::future::pending().await;
        };

        loop {
            let notified = inner.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(err) = self.err() {
                return err;
            }

            match inner.deadline {
                Some(deadline) => {
                    tokio::select! {
                        _ = &mut notified => {}
                        _ = tokio::time::sleep_until(deadline.into()) => {}
                    }
                }
                None => notified.await,
            }
        }
    }
}

impl CancelHandle {
    /// Cancel the context. Idempotent.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::Release);
        self.inner.notify.notify_waiters();
    }
}
