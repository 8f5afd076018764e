//! HTTP codec module for encoding responses onto the wire
//!
//! The pipeline never formats bytes itself; it hands [`Message`](crate::protocol::Message)s
//! to a transport, and the transport runs them through the [`ResponseEncoder`].
//!
//! - [`ResponseEncoder`]: Encodes outgoing HTTP responses
//!   - Header encoding via the `header` module
//!   - Payload encoding via the `body` module (content-length or chunked framing)
//!   - Raw pass-through once a connection is upgraded
//!
//! # Example
//!
//! ```
//! use bytes::{Bytes, BytesMut};
//! use http::Response;
//! use micro_pipeline::codec::ResponseEncoder;
//! use micro_pipeline::protocol::{Message, PayloadItem, PayloadSize};
//! use tokio_util::codec::Encoder;
//!
//! let mut encoder = ResponseEncoder::new();
//! let mut buffer = BytesMut::new();
//!
//! let head = Response::builder().body(()).unwrap();
//! encoder.encode(Message::<_, Bytes>::Header((head, PayloadSize::Chunked)), &mut buffer).unwrap();
//! encoder.encode(Message::<_, Bytes>::Payload(PayloadItem::Chunk(Bytes::from_static(b"hi"))), &mut buffer).unwrap();
//! encoder.encode(Message::<_, Bytes>::Payload(PayloadItem::Eof), &mut buffer).unwrap();
//!
//! assert!(buffer.ends_with(b"2\r\nhi\r\n0\r\n\r\n"));
//! ```

mod body;
mod header;
mod response_encoder;

pub use response_encoder::ResponseEncoder;
