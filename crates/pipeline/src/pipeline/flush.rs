use tracing::trace;
use triomphe::Arc;

use crate::pipeline::metrics::PipelineMetrics;
use crate::protocol::SendError;
use crate::transport::Transport;

/// Decides when the bytes a connection accepted get pushed to the socket.
///
/// Three ways to flush:
/// - [`maybe_flush`](Self::maybe_flush) once the unflushed body bytes reach the threshold
/// - [`run_deferred`](Self::run_deferred) when a finished call scheduled it and the
///   pipeline has nothing else to write right away
/// - [`force_flush`](Self::force_flush) on upgrade, close and errors
#[derive(Debug)]
pub(crate) struct FlushController {
    threshold: usize,
    unflushed: usize,
    // something was written since the last flush, possibly heads only
    dirty: bool,
    deferred: bool,
    metrics: Arc<PipelineMetrics>,
}

impl FlushController {
    pub(crate) fn new(threshold: usize, metrics: Arc<PipelineMetrics>) -> Self {
        Self { threshold, unflushed: 0, dirty: false, deferred: false, metrics }
    }

    pub(crate) fn note_written(&mut self, bytes: usize) {
        self.unflushed += bytes;
        self.dirty = true;
    }

    pub(crate) fn unflushed(&self) -> usize {
        self.unflushed
    }

    pub(crate) fn has_pending(&self) -> bool {
        self.dirty
    }

    pub(crate) fn threshold_reached(&self) -> bool {
        self.unflushed >= self.threshold
    }

    pub(crate) fn is_deferred(&self) -> bool {
        self.deferred
    }

    /// Flushes if the unflushed byte count reached the threshold.
    pub(crate) async fn maybe_flush<T: Transport>(&mut self, transport: &mut T) -> Result<bool, SendError> {
        if !self.threshold_reached() {
            return Ok(false);
        }
        self.flush(transport).await?;
        Ok(true)
    }

    /// Asks for a flush at the end of the current scheduling turn.
    pub(crate) fn schedule_deferred(&mut self) {
        self.deferred = true;
    }

    /// Runs a scheduled flush, provided the pipeline is idle and bytes are still pending.
    ///
    /// A scheduled flush that can't run yet because the pipeline is busy stays scheduled.
    pub(crate) async fn run_deferred<T: Transport>(&mut self, transport: &mut T, idle: bool) -> Result<bool, SendError> {
        if !self.is_deferred() || !idle {
            return Ok(false);
        }
        self.deferred = false;
        if !self.has_pending() {
            return Ok(false);
        }
        self.flush(transport).await?;
        Ok(true)
    }

    pub(crate) async fn force_flush<T: Transport>(&mut self, transport: &mut T) -> Result<(), SendError> {
        self.deferred = false;
        self.flush(transport).await
    }

    /// Forgets pending bytes without flushing, used once the transport is gone.
    pub(crate) fn reset(&mut self) {
        self.unflushed = 0;
        self.dirty = false;
        self.deferred = false;
    }

    /// Flushes right away, leaving a scheduled deferred flush in place.
    pub(crate) async fn flush<T: Transport>(&mut self, transport: &mut T) -> Result<(), SendError> {
        trace!(unflushed = self.unflushed, "flush");
        // the counter restarts even if the flush fails, the connection is torn down then
        let result = transport.flush().await;
        self.unflushed = 0;
        self.dirty = false;
        self.metrics.record_flush();
        result
    }
}
