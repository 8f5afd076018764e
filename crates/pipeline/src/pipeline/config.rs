/// Unflushed body bytes that force a flush.
pub const DEFAULT_FLUSH_THRESHOLD: usize = 64 * 1024;

/// Sized bodies shorter than this are read fully and written in one go.
pub const DEFAULT_SMALL_BODY_THRESHOLD: u64 = 64 * 1024;

/// Tunables of one connection's pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    flush_threshold: usize,
    small_body_threshold: u64,
    max_pending_calls: usize,
    write_buffer_capacity: usize,
    write_backpressure_boundary: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            flush_threshold: DEFAULT_FLUSH_THRESHOLD,
            small_body_threshold: DEFAULT_SMALL_BODY_THRESHOLD,
            max_pending_calls: 16,
            write_buffer_capacity: 8 * 1024,
            write_backpressure_boundary: 2 * DEFAULT_FLUSH_THRESHOLD,
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_flush_threshold(mut self, flush_threshold: usize) -> Self {
        self.flush_threshold = flush_threshold.max(1);
        self
    }

    #[must_use]
    pub fn with_small_body_threshold(mut self, small_body_threshold: u64) -> Self {
        self.small_body_threshold = small_body_threshold;
        self
    }

    /// Calls the pipeline holds at once, from submission until written or disposed.
    /// Further submissions wait for the head to finish.
    #[must_use]
    pub fn with_max_pending_calls(mut self, max_pending_calls: usize) -> Self {
        self.max_pending_calls = max_pending_calls.max(1);
        self
    }

    #[must_use]
    pub fn with_write_buffer(mut self, capacity: usize, backpressure_boundary: usize) -> Self {
        self.write_buffer_capacity = capacity;
        self.write_backpressure_boundary = backpressure_boundary;
        self
    }

    pub fn flush_threshold(&self) -> usize {
        self.flush_threshold
    }

    pub fn small_body_threshold(&self) -> u64 {
        self.small_body_threshold
    }

    pub fn max_pending_calls(&self) -> usize {
        self.max_pending_calls
    }

    pub fn write_buffer_capacity(&self) -> usize {
        self.write_buffer_capacity
    }

    pub fn write_backpressure_boundary(&self) -> usize {
        self.write_backpressure_boundary
    }
}
