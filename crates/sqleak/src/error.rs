//! Error types for sqleak

use thiserror::Error;

/// Result type alias for driver and proxy operations
pub type DriverResult<T> = Result<T, DriverError>;

/// Why a [`Context`](crate::Context) is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ContextError {
    /// The context was cancelled through its handle.
    #[error("context canceled")]
    Canceled,
    /// The context deadline passed.
    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

/// Error types for driver operations.
///
/// Errors produced by a wrapped driver travel through the proxies untouched;
/// the proxies only originate `Skip`, `NoMoreResultSets`, the unsupported
/// transaction option errors, and context errors from the pre-call poll.
#[derive(Debug, Error)]
pub enum DriverError {
    /// The optional fast path is not available; retry via the mandatory path.
    #[error("driver: skip fast-path; continue as if unimplemented")]
    Skip,

    /// No further result sets are available on a cursor.
    #[error("no further result sets")]
    NoMoreResultSets,

    /// The connection cannot honor a non-default isolation level.
    #[error("sql: driver does not support non-default isolation level")]
    UnsupportedIsolation,

    /// The connection cannot open read-only transactions.
    #[error("sql: driver does not support read-only transactions")]
    ReadOnlyUnsupported,

    /// Named arguments were passed to a statement without named parameter support.
    #[error("sql: driver does not support the use of Named Parameters")]
    NamedParametersUnsupported,

    /// The caller's context was already done before the call.
    #[error(transparent)]
    Context(#[from] ContextError),

    /// No driver is registered under this name.
    #[error("sql: unknown driver {0:?} (forgotten import?)")]
    UnknownDriver(String),

    /// A driver is already registered under this name.
    #[error("sql: register called twice for driver {0}")]
    DuplicateDriver(String),

    /// The handle or resource was already closed.
    #[error("sql: {0} is closed")]
    Closed(&'static str),

    /// Error reported by the underlying driver.
    #[error("{0}")]
    Driver(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl DriverError {
    /// Wrap an arbitrary driver error.
    pub fn driver(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Driver(err.into())
    }

    /// Create a free-form error
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }

    /// Check if this is the "try the standard path" signal
    pub fn is_skip(&self) -> bool {
        matches!(self, Self::Skip)
    }

    /// Check if this error came from a done context
    pub fn is_context(&self) -> bool {
        matches!(self, Self::Context(_))
    }
}
