use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

/// Default size of a captured stack snapshot.
pub const DEFAULT_STACK_BUFFER_SIZE: usize = 8 * 1024;

static GLOBAL_POOL: OnceLock<Arc<StackPool>> = OnceLock::new();

/// A pool of fixed-size buffers holding captured stack traces.
///
/// Buffers are handed out exclusively by [`StackPool::acquire`] and returned
/// by [`StackPool::release`], so the pool never grows beyond the number of
/// buffers outstanding at the same time.
#[derive(Debug)]
pub struct StackPool {
    buffer_size: usize,
    idle: Mutex<Vec<Vec<u8>>>,
    allocated: AtomicUsize,
}

impl StackPool {
    /// Create a pool handing out buffers of `buffer_size` bytes.
    pub fn new(buffer_size: usize) -> Self {
        Self {
            buffer_size,
            idle: Mutex::new(Vec::new()),
            allocated: AtomicUsize::new(0),
        }
    }

    /// The process-wide pool with [`DEFAULT_STACK_BUFFER_SIZE`] buffers.
    pub fn global() -> Arc<StackPool> {
        GLOBAL_POOL
            .get_or_init(|| Arc::new(StackPool::new(DEFAULT_STACK_BUFFER_SIZE)))
            .clone()
    }

    /// Capacity of each buffer in bytes.
    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Take an empty buffer, allocating one if none is idle.
    pub fn acquire(&self) -> StackBuffer {
        let recycled = self.idle.lock().pop();
        let bytes = recycled.unwrap_or_else(|| {
            self.allocated.fetch_add(1, Ordering::Relaxed);
            Vec::with_capacity(self.buffer_size)
        });
        StackBuffer {
            bytes,
            limit: self.buffer_size,
            full: false,
        }
    }

    /// Return a buffer to the pool.
    pub fn release(&self, buffer: StackBuffer) {
        let mut bytes = buffer.bytes;
        bytes.clear();
        self.idle.lock().push(bytes);
    }

    /// Buffers currently sitting in the pool.
    pub fn idle(&self) -> usize {
        self.idle.lock().len()
    }

    /// Buffers ever allocated by this pool.
    pub fn allocated(&self) -> usize {
        self.allocated.load(Ordering::Relaxed)
    }
}

impl Default for StackPool {
    fn default() -> Self {
        Self::new(DEFAULT_STACK_BUFFER_SIZE)
    }
}

/// A bounded text sink. Writes past the limit are dropped.
#[derive(Debug)]
pub struct StackBuffer {
    bytes: Vec<u8>,
    limit: usize,
    full: bool,
}

impl StackBuffer {
    /// The captured text.
    pub fn as_str(&self) -> &str {
        // Only whole chars are ever appended.
        std::str::from_utf8(&self.bytes).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Whether a write was cut short.
    pub fn is_truncated(&self) -> bool {
        self.full
    }
}

impl fmt::Write for StackBuffer {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        if self.full {
            return Err(fmt::Error);
        }

        let room = self.limit.saturating_sub(self.bytes.len());
        if s.len() <= room {
            self.bytes.extend_from_slice(s.as_bytes());
            return Ok(());
        }

        let mut end = room;
        while end > 0 && !s.is_char_boundary(end) {
            end -= 1;
        }
        self.bytes.extend_from_slice(&s.as_bytes()[..end]);
        self.full = true;
        // Stop the formatter early; the caller ignores the error.
        Err(fmt::Error)
    }
}
