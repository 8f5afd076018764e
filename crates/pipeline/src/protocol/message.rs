use bytes::{Buf, Bytes};
use http::HeaderMap;

use crate::protocol::ResponseHead;

/// Represents a HTTP message that can either be a header or payload.
///
/// The generic parameter `T` is the header type, while `Data` represents the type
/// of the payload data (defaults to `Bytes`).
#[derive(Debug)]
pub enum Message<T, Data: Buf = Bytes> {
    /// Contains the header information of type `T`
    Header(T),
    /// Contains a chunk of payload data, trailers or the EOF marker
    Payload(PayloadItem<Data>),
}

/// The message type the pipeline hands to a [`Transport`](crate::transport::Transport).
pub type ResponseMessage = Message<(ResponseHead, PayloadSize)>;

/// Represents an item in the HTTP message payload stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadItem<Data: Buf = Bytes> {
    /// A chunk of payload data
    Chunk(Data),
    /// Trailer fields, terminating the payload stream
    Trailers(HeaderMap),
    /// Marks the end of the payload stream
    Eof,
}

/// Represents the framing of an HTTP response payload.
///
/// - Known length: `content-length` framing
/// - Chunked: `transfer-encoding: chunked` framing
/// - Empty: no payload, `content-length: 0`
/// - Upgrade: no framing at all, the connection switches protocol after the head
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PayloadSize {
    /// Payload with known length in bytes
    Length(u64),
    /// Payload using chunked transfer encoding
    Chunked,
    /// Empty payload (no body)
    Empty,
    /// Protocol upgrade, raw bytes follow the head
    Upgrade,
}

impl PayloadSize {
    /// Returns true if the payload uses chunked transfer encoding
    #[inline]
    pub fn is_chunked(&self) -> bool {
        matches!(self, PayloadSize::Chunked)
    }

    /// Returns true if the payload is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        matches!(self, PayloadSize::Empty)
    }
}

impl<T> Message<T> {
    /// Returns true if this message contains payload data
    #[inline]
    pub fn is_payload(&self) -> bool {
        matches!(self, Message::Payload(_))
    }

    /// Returns true if this message contains header information
    #[inline]
    pub fn is_header(&self) -> bool {
        matches!(self, Message::Header(_))
    }
}

impl<T> From<Bytes> for Message<T> {
    fn from(bytes: Bytes) -> Self {
        Self::Payload(PayloadItem::Chunk(bytes))
    }
}

impl<D: Buf> PayloadItem<D> {
    /// Returns true if this item terminates the payload stream
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, PayloadItem::Eof | PayloadItem::Trailers(_))
    }

    /// Returns true if this item contains chunk data
    #[inline]
    pub fn is_chunk(&self) -> bool {
        matches!(self, PayloadItem::Chunk(_))
    }
}
