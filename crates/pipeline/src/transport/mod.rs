//! The write side of a connection, as seen by the pipeline.
//!
//! [`Transport`] is the seam between the pipeline and the socket: the pipeline decides
//! *what* to write and *when* to flush, the transport owns the buffer and the framing
//! codec. [`FramedTransport`] is the implementation over any tokio `AsyncWrite`.

mod framed;

pub use framed::FramedTransport;

use crate::protocol::{ResponseMessage, SendError};

/// Write side of one connection.
///
/// `write` resolves once the transport has accepted the message, which does not mean
/// it reached the socket; only `flush` and `close` push buffered bytes out.
#[trait_variant::make(Transport: Send)]
pub trait LocalTransport {
    /// Hands one message to the transport.
    async fn write(&mut self, message: ResponseMessage) -> Result<(), SendError>;

    /// Pushes every accepted message to the underlying writer.
    async fn flush(&mut self) -> Result<(), SendError>;

    /// Replaces the http framing codec with a raw pass-through.
    fn upgrade(&mut self);

    /// Flushes and shuts the writer down; later writes fail with [`SendError::ConnectionClosed`].
    async fn close(&mut self) -> Result<(), SendError>;
}
