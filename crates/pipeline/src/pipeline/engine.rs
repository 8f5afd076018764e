use futures::channel::mpsc;
use futures::{SinkExt, StreamExt};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};
use triomphe::Arc;

use crate::pipeline::call::{Call, CallState};
use crate::pipeline::config::PipelineConfig;
use crate::pipeline::flush::FlushController;
use crate::pipeline::metrics::{MetricsSnapshot, PipelineMetrics};
use crate::pipeline::queue::PendingCalls;
use crate::pipeline::strategy::{Finish, WriteContext, write_response};
use crate::protocol::SendError;
use crate::transport::Transport;

#[derive(Debug)]
enum Event {
    Submit(Call),
    ReadStarted,
    ReadStopped,
}

/// How a pipeline ended without error.
#[derive(Debug)]
pub enum PipelineOutcome<T> {
    /// every handle is gone and the queue drained, or the last exchange was not keep-alive
    Closed,
    /// the connection switched protocol; the transport now passes raw bytes through
    Upgraded(T),
    /// [`PipelineHandle::shutdown`] was called
    Cancelled,
}

enum Step {
    Continue,
    Closed,
    Upgraded,
    Cancelled,
}

/// Closes the call permits once the pipeline is gone, so waiting submitters give up.
#[derive(Debug)]
struct Permits(std::sync::Arc<Semaphore>);

impl Drop for Permits {
    fn drop(&mut self) {
        self.0.close();
    }
}

/// Writes the responses of one connection in the order their requests arrived.
///
/// The pipeline owns the write side of the connection. Calls come in through a
/// [`PipelineHandle`] as soon as their request has been read; their responses may be
/// produced in any order elsewhere, but a call is only written once it is the head of
/// the queue, i.e. once every earlier call is completely written.
///
/// Flushing is batched: a finished call only schedules a flush, which runs when nothing
/// else can be written right away and the read side is not in the middle of a burst.
/// Streaming bodies additionally flush every [`PipelineConfig::flush_threshold`] bytes.
///
/// ```no_run
/// use micro_pipeline::pipeline::{Call, Pipeline, PipelineConfig};
/// use micro_pipeline::protocol::ResponseDescriptor;
/// use micro_pipeline::transport::FramedTransport;
/// use http::StatusCode;
///
/// # async fn example(socket: tokio::net::tcp::OwnedWriteHalf) {
/// let (pipeline, mut handle) = Pipeline::new(FramedTransport::new(socket), PipelineConfig::default());
/// let engine = tokio::spawn(pipeline.run());
///
/// let (call, responder) = Call::new(true);
/// handle.submit(call).await.unwrap();
/// responder.respond(ResponseDescriptor::empty(StatusCode::NO_CONTENT)).unwrap();
///
/// drop(handle);
/// engine.await.unwrap().unwrap();
/// # }
/// ```
#[derive(Debug)]
pub struct Pipeline<T> {
    transport: T,
    queue: PendingCalls,
    flush: FlushController,
    events: mpsc::Receiver<Event>,
    events_closed: bool,
    reading: bool,
    config: PipelineConfig,
    metrics: Arc<PipelineMetrics>,
    shutdown: CancellationToken,
    permits: Permits,
}

/// Feeds calls and read-side notifications into a [`Pipeline`].
#[derive(Debug, Clone)]
pub struct PipelineHandle {
    events: mpsc::Sender<Event>,
    shutdown: CancellationToken,
    metrics: Arc<PipelineMetrics>,
    permits: std::sync::Arc<Semaphore>,
}

impl<T: Transport> Pipeline<T> {
    pub fn new(transport: T, config: PipelineConfig) -> (Self, PipelineHandle) {
        Self::with_metrics(transport, config, Arc::new(PipelineMetrics::new()))
    }

    /// Creates a pipeline reporting into shared metrics.
    pub fn with_metrics(transport: T, config: PipelineConfig, metrics: Arc<PipelineMetrics>) -> (Self, PipelineHandle) {
        let (sender, receiver) = mpsc::channel(config.max_pending_calls());
        let shutdown = CancellationToken::new();
        let permits = std::sync::Arc::new(Semaphore::new(config.max_pending_calls()));

        let pipeline = Self {
            transport,
            queue: PendingCalls::new(),
            flush: FlushController::new(config.flush_threshold(), Arc::clone(&metrics)),
            events: receiver,
            events_closed: false,
            reading: false,
            config,
            metrics: Arc::clone(&metrics),
            shutdown: shutdown.clone(),
            permits: Permits(std::sync::Arc::clone(&permits)),
        };
        let handle = PipelineHandle { events: sender, shutdown, metrics, permits };
        (pipeline, handle)
    }

    /// Drives the connection until it closes, upgrades, is cancelled or fails.
    ///
    /// Any failure disposes every queued call and closes the transport before the
    /// error is returned; nothing is retried.
    pub async fn run(mut self) -> Result<PipelineOutcome<T>, SendError> {
        loop {
            if self.shutdown.is_cancelled() {
                self.cancel().await;
                return Ok(PipelineOutcome::Cancelled);
            }

            self.drain_events();

            match self.write_head().await {
                Ok(Some(Step::Continue)) => continue,
                Ok(Some(Step::Closed)) => return Ok(PipelineOutcome::Closed),
                Ok(Some(Step::Upgraded)) => return Ok(PipelineOutcome::Upgraded(self.transport)),
                Ok(Some(Step::Cancelled)) => {
                    self.cancel().await;
                    return Ok(PipelineOutcome::Cancelled);
                }
                Ok(None) => {}
                Err(e) => return Err(self.fail(e).await),
            }

            // nothing can be written right now, the scheduling turn ends here
            let idle = !self.reading || !self.accepting();
            if let Err(e) = self.flush.run_deferred(&mut self.transport, idle).await {
                return Err(self.fail(e).await);
            }

            if self.events_closed && self.queue.is_empty() {
                debug!("no more calls, close connection");
                if let Err(e) = self.close().await {
                    return Err(self.fail(e).await);
                }
                return Ok(PipelineOutcome::Closed);
            }

            tokio::select! {
                biased;
                () = self.shutdown.cancelled() => {}
                event = self.events.next(), if !self.events_closed => match event {
                    Some(event) => self.handle_event(event),
                    None => self.events_ended(),
                },
                () = self.queue.head_settled() => {}
            }
        }
    }

    /// A full queue means the read loop waits for a permit and can't be mid-burst.
    fn accepting(&self) -> bool {
        self.queue.len() < self.config.max_pending_calls()
    }

    fn drain_events(&mut self) {
        while !self.events_closed {
            match self.events.try_next() {
                Ok(Some(event)) => self.handle_event(event),
                Ok(None) => self.events_ended(),
                Err(_) => break,
            }
        }
    }

    /// Every handle is gone, so nobody is reading anymore however the read side ended.
    fn events_ended(&mut self) {
        self.events_closed = true;
        self.reading = false;
    }

    fn handle_event(&mut self, event: Event) {
        match event {
            Event::Submit(call) => {
                let sequence = self.queue.enqueue(call);
                self.metrics.record_submitted();
                trace!(sequence, pending = self.queue.len(), "call submitted");
            }
            Event::ReadStarted => self.reading = true,
            Event::ReadStopped => self.reading = false,
        }
    }

    /// Writes the head of the queue if its response is there, `None` when it is not.
    async fn write_head(&mut self) -> Result<Option<Step>, SendError> {
        let (finish, keep_alive) = match self.drive_head().await {
            Ok(Some(written)) => written,
            Ok(None) => return Ok(None),
            Err(e) => {
                if let Some(mut call) = self.queue.advance() {
                    call.transition(CallState::Failed);
                }
                return Err(e);
            }
        };

        match finish {
            Finish::Completed => {
                if let Some(mut call) = self.queue.advance() {
                    call.transition(CallState::Completed);
                }
                self.metrics.record_completed();

                if !keep_alive {
                    debug!("connection is not keep-alive, close after the last response");
                    self.close().await?;
                    return Ok(Some(Step::Closed));
                }

                self.flush.schedule_deferred();
                Ok(Some(Step::Continue))
            }
            Finish::Upgraded => {
                if let Some(mut call) = self.queue.advance() {
                    call.transition(CallState::Completed);
                }
                self.metrics.record_completed();

                let disposed = self.queue.dispose_all();
                if disposed > 0 {
                    warn!(disposed, "dropping calls queued behind a protocol upgrade");
                    self.metrics.record_cancelled(disposed);
                }
                info!("connection upgraded");
                Ok(Some(Step::Upgraded))
            }
            Finish::Cancelled => Ok(Some(Step::Cancelled)),
        }
    }

    async fn drive_head(&mut self) -> Result<Option<(Finish, bool)>, SendError> {
        let Some(call) = self.queue.ready_head() else {
            return Ok(None);
        };

        let response = call.take_response()?;
        call.transition(CallState::Writing);
        let keep_alive = call.keep_alive();

        let mut ctx = WriteContext {
            transport: &mut self.transport,
            flush: &mut self.flush,
            metrics: &self.metrics,
            cancel: &self.shutdown,
        };
        let finish = write_response(&mut ctx, call, response, self.config.small_body_threshold()).await?;
        Ok(Some((finish, keep_alive)))
    }

    async fn close(&mut self) -> Result<(), SendError> {
        let disposed = self.queue.dispose_all();
        if disposed > 0 {
            self.metrics.record_cancelled(disposed);
        }
        self.flush.force_flush(&mut self.transport).await?;
        self.transport.close().await
    }

    async fn cancel(&mut self) {
        let disposed = self.queue.dispose_all();
        self.metrics.record_cancelled(disposed);
        info!(disposed, "pipeline cancelled");

        self.flush.reset();
        if let Err(e) = self.transport.close().await {
            debug!(cause = %e, "failed to close transport after cancellation");
        }
    }

    async fn fail(&mut self, error: SendError) -> SendError {
        self.metrics.record_failed();
        let disposed = self.queue.dispose_all();
        if disposed > 0 {
            self.metrics.record_cancelled(disposed);
        }
        error!(cause = %error, transport_fault = error.is_transport_fault(), disposed, "failed to send response, close connection");

        self.flush.reset();
        if let Err(e) = self.transport.close().await {
            warn!(cause = %e, "failed to close transport");
        }
        error
    }
}

impl PipelineHandle {
    /// Enqueues a fully read call, waiting while the pipeline holds
    /// [`PipelineConfig::max_pending_calls`] unfinished calls.
    pub async fn submit(&mut self, call: Call) -> Result<(), SendError> {
        let permit = std::sync::Arc::clone(&self.permits).acquire_owned().await.map_err(|e| {
            trace!(cause = %e, "pipeline is gone");
            SendError::ConnectionClosed
        })?;
        self.send(Event::Submit(call.with_permit(permit))).await
    }

    /// The read side started a burst; deferred flushes wait until it stops.
    pub async fn notify_read_started(&mut self) -> Result<(), SendError> {
        self.send(Event::ReadStarted).await
    }

    /// The read side has nothing more to read right now.
    pub async fn notify_read_stopped(&mut self) -> Result<(), SendError> {
        self.send(Event::ReadStopped).await
    }

    /// Cancels the pipeline: queued calls are disposed and nothing more is written.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Returns true once the pipeline stopped accepting calls.
    pub fn is_closed(&self) -> bool {
        self.events.is_closed()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    async fn send(&mut self, event: Event) -> Result<(), SendError> {
        self.events.send(event).await.map_err(|e| {
            trace!(cause = %e, "pipeline is gone");
            SendError::ConnectionClosed
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Responder;
    use crate::pipeline::testing::{Op, RecordingTransport, channel_body, data, ok, response};
    use crate::protocol::{BodyDescriptor, Message, ResponseDescriptor};
    use bytes::Bytes;
    use futures::FutureExt;
    use http::StatusCode;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    async fn submit(handle: &mut PipelineHandle, keep_alive: bool) -> Responder {
        let (call, responder) = Call::new(keep_alive);
        handle.submit(call).await.unwrap();
        responder
    }

    async fn settle() {
        for _ in 0..16 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn responses_follow_arrival_order() {
        for order in [[3, 1, 4, 0, 2], [4, 3, 2, 1, 0], [0, 1, 2, 3, 4], [2, 0, 4, 1, 3]] {
            let transport = RecordingTransport::new();
            let (pipeline, mut handle) = Pipeline::new(transport.clone(), PipelineConfig::default());

            let mut responders = Vec::new();
            for _ in 0..5 {
                responders.push(Some(submit(&mut handle, true).await));
            }
            drop(handle);

            let respond = async move {
                for index in order {
                    let responder = responders[index].take().unwrap();
                    responder.respond(ok(format!("body-{index}"))).unwrap();
                    tokio::task::yield_now().await;
                }
            };

            let (outcome, ()) = tokio::join!(pipeline.run(), respond);
            assert!(matches!(outcome.unwrap(), PipelineOutcome::Closed));

            let expected: String = (0..5).map(|i| format!("HTTP/1.1 200 OK\r\ncontent-length: 6\r\n\r\nbody-{i}")).collect();
            assert_eq!(transport.wire(), expected, "responses completed in order {order:?}");
            assert_eq!(transport.ops().last(), Some(&Op::Close));
        }
    }

    #[tokio::test]
    async fn read_burst_gets_a_single_flush() {
        let transport = RecordingTransport::new();
        let (pipeline, mut handle) = Pipeline::new(transport.clone(), PipelineConfig::default());

        handle.notify_read_started().await.unwrap();
        for i in 0..4 {
            submit(&mut handle, true).await.respond(ok(format!("response {i}"))).unwrap();
        }
        handle.notify_read_stopped().await.unwrap();

        let check = async {
            while transport.flush_count() == 0 {
                tokio::task::yield_now().await;
            }
            settle().await;
            let flushes = transport.flush_count();
            handle.shutdown();
            flushes
        };

        let (outcome, flushes) = tokio::join!(pipeline.run(), check);
        assert!(matches!(outcome.unwrap(), PipelineOutcome::Cancelled));
        assert_eq!(flushes, 1);
        // head, payload and terminator of every response
        assert_eq!(transport.write_count(), 12);
    }

    #[tokio::test]
    async fn no_flush_while_reading() {
        let transport = RecordingTransport::new();
        let (pipeline, mut handle) = Pipeline::new(transport.clone(), PipelineConfig::default());

        handle.notify_read_started().await.unwrap();
        submit(&mut handle, true).await.respond(ok("first")).unwrap();

        let check = async {
            while transport.write_count() < 3 {
                tokio::task::yield_now().await;
            }
            settle().await;
            let while_reading = transport.flush_count();

            handle.notify_read_stopped().await.unwrap();
            while transport.flush_count() == 0 {
                tokio::task::yield_now().await;
            }
            handle.shutdown();
            while_reading
        };

        let (outcome, while_reading) = tokio::join!(pipeline.run(), check);
        assert!(matches!(outcome.unwrap(), PipelineOutcome::Cancelled));
        assert_eq!(while_reading, 0);
        assert_eq!(transport.flush_count(), 1);
    }

    #[tokio::test]
    async fn pending_head_flushes_what_was_written() {
        let transport = RecordingTransport::new();
        let (pipeline, mut handle) = Pipeline::new(transport.clone(), PipelineConfig::default());

        submit(&mut handle, true).await.respond(ok("fast")).unwrap();
        let slow = submit(&mut handle, true).await;

        let check = async {
            // the first response must not wait for the second one
            while transport.flush_count() == 0 {
                tokio::task::yield_now().await;
            }
            let written = transport.wire();
            slow.respond(ok("slow")).unwrap();
            drop(handle);
            written
        };

        let (outcome, written) = tokio::join!(pipeline.run(), check);
        assert!(matches!(outcome.unwrap(), PipelineOutcome::Closed));
        assert_eq!(written, "HTTP/1.1 200 OK\r\ncontent-length: 4\r\n\r\nfast");
        assert!(transport.wire().ends_with("slow"));
    }

    #[tokio::test]
    async fn close_after_last_exchange() {
        let transport = RecordingTransport::new();
        let (pipeline, mut handle) = Pipeline::new(transport.clone(), PipelineConfig::default());

        submit(&mut handle, false).await.respond(ok("bye")).unwrap();
        let behind = submit(&mut handle, true).await;

        let outcome = pipeline.run().await.unwrap();
        assert!(matches!(outcome, PipelineOutcome::Closed));

        let ops = transport.ops();
        assert_eq!(ops.len(), 5);
        // the terminator was accepted before flush and close
        assert!(matches!(ops[2], Op::Write(_)));
        assert_eq!(ops[3..], [Op::Flush, Op::Close]);
        assert!(behind.is_disposed());
        assert!(handle.is_closed());
    }

    #[tokio::test]
    async fn upgrade_hands_back_the_transport() {
        let transport = RecordingTransport::new();
        let (pipeline, mut handle) = Pipeline::new(transport.clone(), PipelineConfig::default());

        let mut head = http::Response::builder().status(StatusCode::SWITCHING_PROTOCOLS).body(()).unwrap();
        head.headers_mut().insert(http::header::UPGRADE, http::HeaderValue::from_static("echo"));
        submit(&mut handle, true).await.respond(ResponseDescriptor::new(head, BodyDescriptor::Upgrade)).unwrap();

        let PipelineOutcome::Upgraded(mut upgraded) = pipeline.run().await.unwrap() else {
            panic!("expect the connection to be upgraded");
        };
        assert_eq!(transport.ops()[1..], [Op::Upgrade, Op::Flush]);
        assert_eq!(transport.write_count(), 1);

        upgraded.write(Message::from(Bytes::from_static(b"raw bytes"))).await.unwrap();
        assert!(transport.wire().ends_with("\r\n\r\nraw bytes"));

        let metrics = handle.metrics();
        assert_eq!(metrics.upgrades, 1);
        assert_eq!(metrics.flushes, 1);
    }

    #[tokio::test]
    async fn shutdown_mid_stream_stops_writing() {
        let transport = RecordingTransport::new();
        let (pipeline, mut handle) = Pipeline::new(transport.clone(), PipelineConfig::default());

        let (sender, body, drops) = channel_body();
        sender.unbounded_send(data(b"chunk")).unwrap();
        submit(&mut handle, true).await.respond(ok(BodyDescriptor::streaming(body))).unwrap();

        let stop = async {
            while transport.flush_count() == 0 {
                tokio::task::yield_now().await;
            }
            handle.shutdown();
            let _ = sender.unbounded_send(data(b"late"));
        };

        let (outcome, ()) = tokio::join!(pipeline.run(), stop);
        assert!(matches!(outcome.unwrap(), PipelineOutcome::Cancelled));

        // head and the first chunk only
        assert_eq!(transport.write_count(), 2);
        assert_eq!(transport.ops().last(), Some(&Op::Close));
        assert!(!transport.wire().contains("late"));
        assert_eq!(drops.load(Ordering::SeqCst), 1);
        assert_eq!(handle.metrics().cancelled, 1);
    }

    #[tokio::test]
    async fn transport_fault_fails_and_disposes() {
        let transport = RecordingTransport::new().fail_write_at(1);
        let (pipeline, mut handle) = Pipeline::new(transport.clone(), PipelineConfig::default());

        submit(&mut handle, true).await.respond(ok("lost")).unwrap();
        let behind = submit(&mut handle, true).await;

        let error = pipeline.run().await.unwrap_err();
        assert!(matches!(error, SendError::ChannelWrite { .. }));
        assert!(behind.is_disposed());
        assert!(transport.is_closed());

        let metrics = handle.metrics();
        assert_eq!(metrics.failed, 1);
        assert_eq!(metrics.cancelled, 1);
        assert_eq!(metrics.completed, 0);
    }

    #[tokio::test]
    async fn body_fault_aborts_connection() {
        let transport = RecordingTransport::new();
        let (pipeline, mut handle) = Pipeline::new(transport.clone(), PipelineConfig::default());

        let (sender, body, drops) = channel_body();
        sender.unbounded_send(data(b"half")).unwrap();
        sender.unbounded_send(Err("producer crashed".into())).unwrap();
        submit(&mut handle, true).await.respond(ok(BodyDescriptor::streaming(body))).unwrap();

        let error = pipeline.run().await.unwrap_err();
        assert!(matches!(error, SendError::Body { .. }));
        assert!(!error.is_transport_fault());
        assert_eq!(drops.load(Ordering::SeqCst), 1);
        assert_eq!(transport.ops().last(), Some(&Op::Close));
        assert!(!transport.wire().ends_with("0\r\n\r\n"));
    }

    #[tokio::test]
    async fn abandoned_response_fails_connection() {
        let transport = RecordingTransport::new();
        let (pipeline, mut handle) = Pipeline::new(transport.clone(), PipelineConfig::default());

        drop(submit(&mut handle, true).await);

        let error = pipeline.run().await.unwrap_err();
        assert!(matches!(error, SendError::ResponseAbandoned));
        assert_eq!(transport.ops(), vec![Op::Close]);
    }

    #[tokio::test]
    async fn full_queue_suspends_submitter() {
        let metrics = Arc::new(PipelineMetrics::new());
        let config = PipelineConfig::default().with_max_pending_calls(1);
        let (pipeline, mut handle) = Pipeline::with_metrics(RecordingTransport::new(), config, Arc::clone(&metrics));
        let engine = tokio::spawn(pipeline.run());

        let first = submit(&mut handle, true).await;
        let (call, second) = Call::new(true);
        {
            let mut pending = Box::pin(handle.submit(call));
            settle().await;
            // exactly one call held, nothing parked in between
            assert!((&mut pending).now_or_never().is_none());
            assert_eq!(metrics.snapshot().submitted, 1);

            first.respond(ok("first")).unwrap();
            pending.await.unwrap();
        }

        second.respond(ok("second")).unwrap();
        drop(handle);
        assert!(matches!(engine.await.unwrap().unwrap(), PipelineOutcome::Closed));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.submitted, 2);
        assert_eq!(snapshot.completed, 2);
    }

    #[tokio::test]
    async fn read_side_gone_mid_burst_still_flushes() {
        let transport = RecordingTransport::new();
        let (pipeline, mut handle) = Pipeline::new(transport.clone(), PipelineConfig::default());

        handle.notify_read_started().await.unwrap();
        submit(&mut handle, true).await.respond(ok("ready")).unwrap();
        let slow = submit(&mut handle, true).await;
        // the read loop ended without saying it stopped reading
        drop(handle);

        let check = async {
            let flushed = tokio::time::timeout(Duration::from_millis(200), async {
                while transport.flush_count() == 0 {
                    tokio::task::yield_now().await;
                }
            })
            .await
            .is_ok();
            let written = transport.wire();
            slow.respond(ok("slow")).unwrap();
            (flushed, written)
        };

        let (outcome, (flushed, written)) = tokio::join!(pipeline.run(), check);
        assert!(matches!(outcome.unwrap(), PipelineOutcome::Closed));
        assert!(flushed);
        assert_eq!(written, "HTTP/1.1 200 OK\r\ncontent-length: 5\r\n\r\nready");
    }

    #[tokio::test]
    async fn flush_fault_counts_as_failure() {
        let metrics = Arc::new(PipelineMetrics::new());
        let transport = RecordingTransport::new().fail_flush();
        let (pipeline, mut handle) = Pipeline::with_metrics(transport.clone(), PipelineConfig::default(), Arc::clone(&metrics));

        submit(&mut handle, true).await.respond(ok("written")).unwrap();
        drop(handle);

        let error = pipeline.run().await.unwrap_err();
        assert!(matches!(error, SendError::ChannelWrite { .. }));
        assert!(transport.is_closed());

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.failed, 1);
        assert_eq!(snapshot.completed, 1);
    }

    #[tokio::test]
    async fn submit_after_pipeline_is_gone() {
        let (pipeline, mut handle) = Pipeline::new(RecordingTransport::new(), PipelineConfig::default());
        drop(pipeline);

        let (call, responder) = Call::new(true);
        assert!(matches!(handle.submit(call).await, Err(SendError::ConnectionClosed)));
        assert!(responder.is_disposed());
    }

    #[tokio::test]
    async fn metrics_count_calls() {
        let metrics = Arc::new(PipelineMetrics::new());
        let (pipeline, mut handle) = Pipeline::with_metrics(RecordingTransport::new(), PipelineConfig::default(), Arc::clone(&metrics));

        for _ in 0..3 {
            submit(&mut handle, true).await.respond(response(StatusCode::NO_CONTENT, BodyDescriptor::Empty)).unwrap();
        }
        drop(handle);

        pipeline.run().await.unwrap();
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.submitted, 3);
        assert_eq!(snapshot.completed, 3);
        assert_eq!(snapshot.failed, 0);
        assert_eq!(snapshot.body_bytes, 0);
    }
}
