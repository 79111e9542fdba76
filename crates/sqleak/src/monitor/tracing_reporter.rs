use super::types::{LeakReport, LeakReporter};
use tracing::Level;

/// Emits leak reports as `tracing` events on target `sqleak`.
///
/// The event message is the full warning line (kind, timeout and stack);
/// `resource` and `timeout` are also attached as fields.
#[derive(Debug, Clone)]
pub struct TracingReporter {
    /// Tracing event level to emit at.
    pub level: Level,
}

impl Default for TracingReporter {
    fn default() -> Self {
        Self { level: Level::WARN }
    }
}

impl TracingReporter {
    /// Create a reporter emitting at `WARN`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the tracing event level.
    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }
}

impl LeakReporter for TracingReporter {
    fn report(&self, leak: &LeakReport<'_>) {
        // tracing macros need the level at compile time.
        macro_rules! emit_at_level {
            ($level:expr, $($field:tt)*) => {
                match $level {
                    Level::ERROR => tracing::error!($($field)*),
                    Level::WARN => tracing::warn!($($field)*),
                    Level::INFO => tracing::info!($($field)*),
                    Level::DEBUG => tracing::debug!($($field)*),
                    _ => tracing::trace!($($field)*),
                }
            };
        }

        emit_at_level!(
            self.level,
            target: "sqleak",
            resource = %leak.kind,
            timeout = ?leak.timeout,
            "{}",
            leak
        );
    }
}
