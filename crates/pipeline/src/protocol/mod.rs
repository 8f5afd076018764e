//! Core HTTP protocol abstractions used by the pipeline.
//!
//! # Architecture
//!
//! - **Message Handling** ([`message`]): wire message vocabulary
//!   - [`Message`]: Represents either a response head or a payload item
//!   - [`PayloadItem`]: A body chunk, trailers, or EOF
//!   - [`PayloadSize`]: The framing chosen for a response body
//!
//! - **Response Processing** ([`response`]): what handlers produce
//!   - [`ResponseDescriptor`]: status, headers and a [`BodyDescriptor`]
//!   - [`ResponseHead`]: Type alias for response headers before body attachment
//!
//! - **Request Metadata** ([`request`]): keep-alive detection
//!
//! - **Error Handling** ([`error`]):
//!   - [`HttpError`]: Top-level error type
//!   - [`SendError`]: Response sending errors

mod message;
pub use message::Message;
pub use message::PayloadItem;
pub use message::PayloadSize;
pub use message::ResponseMessage;

mod request;
pub use request::is_keep_alive;

mod response;
pub use response::BodyDescriptor;
pub use response::BodySource;
pub use response::ResponseDescriptor;
pub use response::ResponseHead;

mod error;
pub use error::BoxError;
pub use error::HttpError;
pub use error::SendError;
