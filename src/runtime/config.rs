//! Runtime configuration.

/// Configuration of a [`Runtime`](crate::Runtime).
///
/// # Default Configuration
///
/// | Field | Default |
/// |-------|---------|
/// | `stack_capacity` | 1024 slots |
/// | `max_heap_objects` | 1,000,000 |
/// | `trace_redirections` | `false` |
/// | `strict_write_back` | `true` |
///
/// # Presets
///
/// - [`minimal()`](Self::minimal) - Small frames and heap, for tests and tools
/// - [`diagnostic()`](Self::diagnostic) - Default limits with redirection tracing
///
/// # Example
///
/// ```rust
/// use crossbind::RuntimeConfig;
///
/// let config = RuntimeConfig::default()
///     .with_stack_capacity(256)
///     .with_trace_redirections(true);
///
/// let custom = RuntimeConfig {
///     strict_write_back: false,
///     ..RuntimeConfig::minimal()
/// };
/// # let _ = (config, custom);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Slot capacity of every frame created by [`Runtime::new_frame`](crate::Runtime::new_frame).
    ///
    /// Shared by operands, locals and value-type reservations.
    pub stack_capacity: usize,

    /// Maximum number of live objects on the managed heap (0 for unlimited).
    pub max_heap_objects: usize,

    /// Log every redirected invocation at trace level.
    pub trace_redirections: bool,

    /// Whether a write-back to a primitive slot is an error.
    ///
    /// When `false` the write is skipped and a warning is logged.
    pub strict_write_back: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            stack_capacity: 1024,
            max_heap_objects: 1_000_000,
            trace_redirections: false,
            strict_write_back: true,
        }
    }
}

impl RuntimeConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Small frames and heap.
    #[must_use]
    pub fn minimal() -> Self {
        Self {
            stack_capacity: 64,
            max_heap_objects: 10_000,
            ..Default::default()
        }
    }

    /// Default limits with redirection tracing enabled.
    #[must_use]
    pub fn diagnostic() -> Self {
        Self {
            trace_redirections: true,
            ..Default::default()
        }
    }

    /// Sets the frame slot capacity.
    #[must_use]
    pub fn with_stack_capacity(mut self, capacity: usize) -> Self {
        self.stack_capacity = capacity;
        self
    }

    /// Sets the heap object limit (0 for unlimited).
    #[must_use]
    pub fn with_max_heap_objects(mut self, max: usize) -> Self {
        self.max_heap_objects = max;
        self
    }

    /// Enables or disables redirection tracing.
    #[must_use]
    pub fn with_trace_redirections(mut self, enabled: bool) -> Self {
        self.trace_redirections = enabled;
        self
    }

    /// Sets strict or lenient write-back.
    #[must_use]
    pub fn with_strict_write_back(mut self, strict: bool) -> Self {
        self.strict_write_back = strict;
        self
    }
}
