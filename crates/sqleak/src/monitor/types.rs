use std::fmt;
use std::time::Duration;

/// The kind of resource a monitor watches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// Prepared statement
    Stmt,
    /// Result cursor
    Rows,
    /// Transaction
    Tx,
}

impl ResourceKind {
    /// The name used in leak reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Stmt => "Stmt",
            ResourceKind::Rows => "Rows",
            ResourceKind::Tx => "Tx",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resource that was still open when its monitor fired.
///
/// `Display` renders the leak warning line.
#[derive(Debug, Clone, Copy)]
pub struct LeakReport<'a> {
    pub kind: ResourceKind,
    pub timeout: Duration,
    /// Stack captured when the resource was opened, possibly truncated.
    pub stack: &'a str,
}

impl fmt::Display for LeakReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "likely resource leak detected: {} not closed within {:?} after opening:\n{}",
            self.kind, self.timeout, self.stack
        )
    }
}

/// Receives leak reports.
///
/// Called from the deferred check, never from the caller that opened the
/// resource. Panics are caught and discarded.
pub trait LeakReporter: Send + Sync {
    fn report(&self, leak: &LeakReport<'_>);
}

impl<F> LeakReporter for F
where
    F: Fn(&LeakReport<'_>) + Send + Sync,
{
    fn report(&self, leak: &LeakReport<'_>) {
        self(leak)
    }
}
