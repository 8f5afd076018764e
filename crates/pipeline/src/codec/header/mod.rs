//! HTTP header processing module
//!
//! - [`HeaderEncoder`]: Encodes HTTP response heads to bytes, setting the
//!   `content-length` or `transfer-encoding` header for the chosen framing

mod header_encoder;

pub use header_encoder::HeaderEncoder;
