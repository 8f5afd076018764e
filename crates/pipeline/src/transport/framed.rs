use futures::SinkExt;
use tokio::io::AsyncWrite;
use tokio_util::codec::FramedWrite;
use tracing::debug;

use crate::codec::ResponseEncoder;
use crate::protocol::{ResponseMessage, SendError};
use crate::transport::Transport;

/// A [`Transport`] writing through a [`ResponseEncoder`] into any `AsyncWrite`.
#[derive(Debug)]
pub struct FramedTransport<W> {
    framed_write: FramedWrite<W, ResponseEncoder>,
    closed: bool,
}

impl<W> FramedTransport<W>
where
    W: AsyncWrite + Unpin,
{
    pub fn new(writer: W) -> Self {
        Self { framed_write: FramedWrite::new(writer, ResponseEncoder::new()), closed: false }
    }

    /// `backpressure_boundary` is the buffered size at which the write buffer drains
    /// itself regardless of the pipeline's own flush decisions.
    pub fn with_capacity(writer: W, capacity: usize, backpressure_boundary: usize) -> Self {
        let mut framed_write = FramedWrite::new(writer, ResponseEncoder::new());
        framed_write.write_buffer_mut().reserve(capacity);
        framed_write.set_backpressure_boundary(backpressure_boundary);
        Self { framed_write, closed: false }
    }

    /// Bytes accepted but not flushed yet.
    pub fn buffered(&self) -> usize {
        self.framed_write.write_buffer().len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn get_mut(&mut self) -> &mut W {
        self.framed_write.get_mut()
    }

    /// Returns the raw writer. Anything still buffered is discarded, so flush first.
    pub fn into_inner(self) -> W {
        self.framed_write.into_inner()
    }
}

impl<W> Transport for FramedTransport<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn write(&mut self, message: ResponseMessage) -> Result<(), SendError> {
        if self.closed {
            return Err(SendError::ConnectionClosed);
        }
        self.framed_write.feed(message).await
    }

    async fn flush(&mut self) -> Result<(), SendError> {
        if self.closed {
            return Err(SendError::ConnectionClosed);
        }
        SinkExt::<ResponseMessage>::flush(&mut self.framed_write).await
    }

    fn upgrade(&mut self) {
        self.framed_write.encoder_mut().upgrade();
    }

    async fn close(&mut self) -> Result<(), SendError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        debug!(buffered = self.framed_write.write_buffer().len(), "closing transport");
        SinkExt::<ResponseMessage>::close(&mut self.framed_write).await
    }
}
