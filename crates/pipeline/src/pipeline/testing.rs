//! In-memory transport and bodies for pipeline tests.

use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use futures::channel::mpsc;
use http::{Response, StatusCode};
use http_body::{Body, Frame};
use tokio_util::codec::Encoder;

use crate::codec::ResponseEncoder;
use crate::protocol::{BodyDescriptor, BoxError, ResponseDescriptor, ResponseMessage, SendError};
use crate::transport::Transport;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Op {
    /// the encoded bytes of one message
    Write(Bytes),
    Flush,
    Upgrade,
    Close,
}

#[derive(Debug, Default)]
struct Recorder {
    ops: Vec<Op>,
    encoder: ResponseEncoder,
    wire: Vec<u8>,
    writes: usize,
    fail_write_at: Option<usize>,
    fail_flush: bool,
    closed: bool,
}

/// Encodes every message like the real transport and records what happened.
#[derive(Debug, Clone, Default)]
pub(crate) struct RecordingTransport {
    recorder: Arc<Mutex<Recorder>>,
}

impl RecordingTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// The write with this index (0 based) fails with a connection reset.
    pub(crate) fn fail_write_at(self, index: usize) -> Self {
        self.recorder.lock().unwrap().fail_write_at = Some(index);
        self
    }

    pub(crate) fn fail_flush(self) -> Self {
        self.recorder.lock().unwrap().fail_flush = true;
        self
    }

    pub(crate) fn ops(&self) -> Vec<Op> {
        self.recorder.lock().unwrap().ops.clone()
    }

    pub(crate) fn wire(&self) -> String {
        String::from_utf8(self.recorder.lock().unwrap().wire.clone()).unwrap()
    }

    pub(crate) fn flush_count(&self) -> usize {
        self.ops().iter().filter(|op| matches!(op, Op::Flush)).count()
    }

    pub(crate) fn write_count(&self) -> usize {
        self.ops().iter().filter(|op| matches!(op, Op::Write(_))).count()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.recorder.lock().unwrap().closed
    }
}

impl Transport for RecordingTransport {
    async fn write(&mut self, message: ResponseMessage) -> Result<(), SendError> {
        let mut recorder = self.recorder.lock().unwrap();
        if recorder.closed {
            return Err(SendError::ConnectionClosed);
        }

        let index = recorder.writes;
        recorder.writes += 1;
        if recorder.fail_write_at == Some(index) {
            return Err(io::Error::from(io::ErrorKind::ConnectionReset).into());
        }

        let mut dst = BytesMut::new();
        recorder.encoder.encode(message, &mut dst)?;
        recorder.wire.extend_from_slice(&dst);
        recorder.ops.push(Op::Write(dst.freeze()));
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), SendError> {
        let mut recorder = self.recorder.lock().unwrap();
        recorder.ops.push(Op::Flush);
        if recorder.fail_flush {
            return Err(io::Error::from(io::ErrorKind::BrokenPipe).into());
        }
        Ok(())
    }

    fn upgrade(&mut self) {
        let mut recorder = self.recorder.lock().unwrap();
        recorder.encoder.upgrade();
        recorder.ops.push(Op::Upgrade);
    }

    async fn close(&mut self) -> Result<(), SendError> {
        let mut recorder = self.recorder.lock().unwrap();
        recorder.closed = true;
        recorder.ops.push(Op::Close);
        Ok(())
    }
}

/// A body fed frame by frame from the test, counting how often it is released.
#[derive(Debug)]
pub(crate) struct ChannelBody {
    receiver: mpsc::UnboundedReceiver<Result<Frame<Bytes>, BoxError>>,
    drops: Arc<AtomicUsize>,
}

pub(crate) type FrameSender = mpsc::UnboundedSender<Result<Frame<Bytes>, BoxError>>;

pub(crate) fn channel_body() -> (FrameSender, ChannelBody, Arc<AtomicUsize>) {
    let (sender, receiver) = mpsc::unbounded();
    let drops = Arc::new(AtomicUsize::new(0));
    (sender, ChannelBody { receiver, drops: Arc::clone(&drops) }, drops)
}

impl Body for ChannelBody {
    type Data = Bytes;
    type Error = BoxError;

    fn poll_frame(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        self.receiver.poll_next_unpin(cx)
    }
}

impl Drop for ChannelBody {
    fn drop(&mut self) {
        self.drops.fetch_add(1, Ordering::SeqCst);
    }
}

pub(crate) fn data(bytes: &'static [u8]) -> Result<Frame<Bytes>, BoxError> {
    Ok(Frame::data(Bytes::from_static(bytes)))
}

pub(crate) fn response(status: StatusCode, body: BodyDescriptor) -> ResponseDescriptor {
    ResponseDescriptor::new(Response::builder().status(status).body(()).unwrap(), body)
}

pub(crate) fn ok(body: impl Into<BodyDescriptor>) -> ResponseDescriptor {
    response(StatusCode::OK, body.into())
}
