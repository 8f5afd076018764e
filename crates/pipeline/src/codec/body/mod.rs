//! HTTP body encoding for response payloads
//!
//! ## Encoders
//! - [`ChunkedEncoder`](chunked_encoder::ChunkedEncoder): chunked transfer encoding,
//!   including the trailer section
//! - [`LengthEncoder`](length_encoder::LengthEncoder): content-length framing, checked
//!   against the declared length
//! - [`PayloadEncoder`]: picks one of the above for a [`PayloadSize`](crate::protocol::PayloadSize)

mod chunked_encoder;
mod length_encoder;
mod payload_encoder;

pub use payload_encoder::PayloadEncoder;
