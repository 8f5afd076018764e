//! Body transmission strategies.
//!
//! [`Strategy::select`] looks at a [`BodyDescriptor`] and picks exactly one way of
//! writing it; [`write_response`] runs that strategy against the transport.

use bytes::Bytes;
use futures::FutureExt;
use http_body::Frame;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::pipeline::call::{Call, CallState};
use crate::pipeline::flush::FlushController;
use crate::pipeline::metrics::PipelineMetrics;
use crate::protocol::{
    BodyDescriptor, BodySource, BoxError, Message, PayloadItem, PayloadSize, ResponseDescriptor, ResponseHead, ResponseMessage,
    SendError,
};
use crate::transport::Transport;

/// How a response body goes onto the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// head and terminator only
    Empty,
    /// head and the in-memory payload
    Full,
    /// a small sized body, read completely before anything is written
    Buffered,
    /// a body drained chunk by chunk; `eager` flushes whenever the producer falls behind
    Streamed { eager: bool },
    /// switch the connection to a raw pass-through
    Upgrade,
}

impl Strategy {
    pub fn select(body: &BodyDescriptor, small_body_threshold: u64) -> Self {
        match body {
            BodyDescriptor::Empty | BodyDescriptor::Sized { length: 0, .. } => Strategy::Empty,
            BodyDescriptor::Full(bytes) if bytes.is_empty() => Strategy::Empty,
            BodyDescriptor::Full(_) => Strategy::Full,
            BodyDescriptor::Sized { length, .. } if *length < small_body_threshold => Strategy::Buffered,
            // the length is known, batching by size alone is enough
            BodyDescriptor::Sized { .. } => Strategy::Streamed { eager: false },
            BodyDescriptor::Unsized(_) => Strategy::Streamed { eager: true },
            BodyDescriptor::Upgrade => Strategy::Upgrade,
        }
    }
}

/// How a strategy ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Finish {
    Completed,
    Upgraded,
    Cancelled,
}

/// Everything a strategy writes through, borrowed from the pipeline.
pub(crate) struct WriteContext<'a, T> {
    pub(crate) transport: &'a mut T,
    pub(crate) flush: &'a mut FlushController,
    pub(crate) metrics: &'a PipelineMetrics,
    pub(crate) cancel: &'a CancellationToken,
}

impl<T: Transport> WriteContext<'_, T> {
    async fn write(&mut self, message: ResponseMessage) -> Result<(), SendError> {
        self.transport.write(message).await?;
        self.flush.note_written(0);
        Ok(())
    }

    async fn write_chunk(&mut self, data: Bytes) -> Result<(), SendError> {
        let size = data.len();
        self.transport.write(Message::from(data)).await?;
        self.flush.note_written(size);
        self.metrics.record_body_bytes(size);
        Ok(())
    }

    async fn maybe_flush(&mut self) -> Result<bool, SendError> {
        self.flush.maybe_flush(&mut *self.transport).await
    }
}

/// Writes one response with the strategy its body calls for.
pub(crate) async fn write_response<T: Transport>(
    ctx: &mut WriteContext<'_, T>,
    call: &mut Call,
    response: ResponseDescriptor,
    small_body_threshold: u64,
) -> Result<Finish, SendError> {
    let (head, body) = response.into_parts();
    let strategy = Strategy::select(&body, small_body_threshold);
    debug!(sequence = ?call.sequence(), status = head.status().as_u16(), ?strategy, "write response");

    match (strategy, body) {
        (Strategy::Empty, _) => write_empty(ctx, call, head).await,
        (Strategy::Full, BodyDescriptor::Full(bytes)) => write_full(ctx, call, head, bytes).await,
        (Strategy::Buffered, BodyDescriptor::Sized { length, source }) => write_buffered(ctx, call, head, length, source).await,
        (Strategy::Streamed { eager }, BodyDescriptor::Sized { length, source }) => {
            write_streamed(ctx, call, head, PayloadSize::Length(length), source, eager).await
        }
        (Strategy::Streamed { eager }, BodyDescriptor::Unsized(source)) => {
            write_streamed(ctx, call, head, PayloadSize::Chunked, source, eager).await
        }
        (Strategy::Upgrade, _) => write_upgrade(ctx, head).await,
        (strategy, body) => Err(SendError::invalid_body(format!("strategy {strategy:?} does not fit body {body:?}"))),
    }
}

async fn write_empty<T: Transport>(ctx: &mut WriteContext<'_, T>, call: &mut Call, head: ResponseHead) -> Result<Finish, SendError> {
    ctx.write(Message::Header((head, PayloadSize::Empty))).await?;
    call.transition(CallState::Finalizing);
    ctx.write(Message::Payload(PayloadItem::Eof)).await?;
    Ok(Finish::Completed)
}

async fn write_full<T: Transport>(
    ctx: &mut WriteContext<'_, T>,
    call: &mut Call,
    head: ResponseHead,
    bytes: Bytes,
) -> Result<Finish, SendError> {
    ctx.write(Message::Header((head, PayloadSize::Length(bytes.len() as u64)))).await?;
    ctx.write_chunk(bytes).await?;
    call.transition(CallState::Finalizing);
    ctx.write(Message::Payload(PayloadItem::Eof)).await?;
    ctx.maybe_flush().await?;
    Ok(Finish::Completed)
}

async fn write_buffered<T: Transport>(
    ctx: &mut WriteContext<'_, T>,
    call: &mut Call,
    head: ResponseHead,
    length: u64,
    source: BodySource,
) -> Result<Finish, SendError> {
    // a source producing more than it declared is cut off at the first frame past the length
    let limited = Limited::new(source, usize::try_from(length).unwrap_or(usize::MAX));
    let collected = tokio::select! {
        biased;
        () = ctx.cancel.cancelled() => return Ok(Finish::Cancelled),
        collected = limited.collect() => collected.map_err(|e| {
            if e.is::<LengthLimitError>() {
                SendError::invalid_body(format!("body exceeds declared length {length}"))
            } else {
                SendError::body(e)
            }
        })?,
    };

    // nothing is on the wire yet, a wrong length fails the call before the head is committed
    let bytes = collected.to_bytes();
    if bytes.len() as u64 != length {
        return Err(SendError::invalid_body(format!("body has {} bytes but declared {length}", bytes.len())));
    }

    write_full(ctx, call, head, bytes).await
}

async fn write_streamed<T: Transport>(
    ctx: &mut WriteContext<'_, T>,
    call: &mut Call,
    head: ResponseHead,
    payload_size: PayloadSize,
    mut source: BodySource,
    eager: bool,
) -> Result<Finish, SendError> {
    ctx.write(Message::Header((head, payload_size))).await?;

    // a frame pulled without waiting while checking whether the producer fell behind
    let mut pulled: Option<Option<Result<Frame<Bytes>, BoxError>>> = None;

    loop {
        if ctx.cancel.is_cancelled() {
            return Ok(Finish::Cancelled);
        }

        let frame = match pulled.take() {
            Some(frame) => frame,
            None => tokio::select! {
                biased;
                () = ctx.cancel.cancelled() => return Ok(Finish::Cancelled),
                frame = source.frame() => frame,
            },
        };

        let frame = match frame {
            None => break,
            Some(Err(e)) => return Err(SendError::body(e)),
            Some(Ok(frame)) => frame,
        };

        let frame = match frame.into_data() {
            Ok(data) => {
                if data.is_empty() {
                    continue;
                }
                ctx.write_chunk(data).await?;
                if ctx.maybe_flush().await? || !eager {
                    continue;
                }
                match source.frame().now_or_never() {
                    Some(frame) => pulled = Some(frame),
                    None => {
                        trace!(unflushed = ctx.flush.unflushed(), "caught up with the body producer, flush");
                        ctx.flush.flush(&mut *ctx.transport).await?;
                    }
                }
                continue;
            }
            Err(frame) => frame,
        };

        match frame.into_trailers() {
            Ok(trailers) => {
                call.transition(CallState::Finalizing);
                ctx.write(Message::Payload(PayloadItem::Trailers(trailers))).await?;
                return Ok(Finish::Completed);
            }
            Err(_) => trace!("skip unknown body frame"),
        }
    }

    call.transition(CallState::Finalizing);
    ctx.write(Message::Payload(PayloadItem::Eof)).await?;
    Ok(Finish::Completed)
}

async fn write_upgrade<T: Transport>(ctx: &mut WriteContext<'_, T>, head: ResponseHead) -> Result<Finish, SendError> {
    ctx.write(Message::Header((head, PayloadSize::Upgrade))).await?;
    ctx.transport.upgrade();
    ctx.flush.force_flush(&mut *ctx.transport).await?;
    ctx.metrics.record_upgrade();
    Ok(Finish::Upgraded)
}
