//! HTTP response descriptors.
//!
//! A [`ResponseDescriptor`] is what the external handler hands to the pipeline: the
//! response head plus a [`BodyDescriptor`] telling the pipeline how the body will be
//! produced. Once built, a descriptor is only ever moved, never mutated.

use std::fmt;

use bytes::Bytes;
use http::{Response, StatusCode};
use http_body::Body;
use http_body_util::BodyExt;
use http_body_util::combinators::UnsyncBoxBody;

use crate::protocol::BoxError;

/// Type alias for HTTP response headers.
///
/// This type represents the header portion of an HTTP response, using
/// `http::Response<()>` with an empty body placeholder.
pub type ResponseHead = Response<()>;

/// Pull-based byte stream a streaming response body is drained from.
pub type BodySource = UnsyncBoxBody<Bytes, BoxError>;

/// Describes how a response body will be produced.
pub enum BodyDescriptor {
    /// no body at all
    Empty,
    /// the whole body is already in memory
    Full(Bytes),
    /// a streaming body whose total length is known up front
    Sized { length: u64, source: BodySource },
    /// a streaming body of unknown length
    Unsized(BodySource),
    /// the response switches the connection to another protocol
    Upgrade,
}

impl BodyDescriptor {
    pub fn full<B: Into<Bytes>>(bytes: B) -> Self {
        let bytes = bytes.into();
        if bytes.is_empty() { Self::Empty } else { Self::Full(bytes) }
    }

    pub fn sized<B>(length: u64, body: B) -> Self
    where
        B: Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        Self::Sized { length, source: box_source(body) }
    }

    pub fn streaming<B>(body: B) -> Self
    where
        B: Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        Self::Unsized(box_source(body))
    }

    /// Classifies an arbitrary body by its size hint.
    pub fn from_body<B>(body: B) -> Self
    where
        B: Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        match body.size_hint().exact() {
            Some(0) => Self::Empty,
            Some(length) => Self::sized(length, body),
            None => Self::streaming(body),
        }
    }
}

fn box_source<B>(body: B) -> BodySource
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError>,
{
    body.map_err(Into::into).boxed_unsync()
}

impl fmt::Debug for BodyDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BodyDescriptor::Empty => f.write_str("Empty"),
            BodyDescriptor::Full(bytes) => f.debug_tuple("Full").field(&bytes.len()).finish(),
            BodyDescriptor::Sized { length, .. } => f.debug_struct("Sized").field("length", length).finish_non_exhaustive(),
            BodyDescriptor::Unsized(_) => f.write_str("Unsized"),
            BodyDescriptor::Upgrade => f.write_str("Upgrade"),
        }
    }
}

impl From<Bytes> for BodyDescriptor {
    fn from(bytes: Bytes) -> Self {
        Self::full(bytes)
    }
}

impl From<String> for BodyDescriptor {
    fn from(value: String) -> Self {
        Self::full(value)
    }
}

impl From<&'static str> for BodyDescriptor {
    fn from(value: &'static str) -> Self {
        Self::full(value)
    }
}

impl From<()> for BodyDescriptor {
    fn from((): ()) -> Self {
        Self::Empty
    }
}

/// Status, headers and body descriptor of one response.
#[derive(Debug)]
pub struct ResponseDescriptor {
    head: ResponseHead,
    body: BodyDescriptor,
}

impl ResponseDescriptor {
    pub fn new(head: ResponseHead, body: BodyDescriptor) -> Self {
        Self { head, body }
    }

    /// A response with the given status and no body.
    pub fn empty(status: StatusCode) -> Self {
        let mut head = ResponseHead::new(());
        *head.status_mut() = status;
        Self::new(head, BodyDescriptor::Empty)
    }

    /// Converts a handler response into a descriptor.
    ///
    /// `101 Switching Protocols` becomes [`BodyDescriptor::Upgrade`] and drops the body,
    /// everything else is classified through [`BodyDescriptor::from_body`].
    pub fn from_response<B>(response: Response<B>) -> Self
    where
        B: Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        let (parts, body) = response.into_parts();
        let head = ResponseHead::from_parts(parts, ());
        let body = if head.status() == StatusCode::SWITCHING_PROTOCOLS {
            BodyDescriptor::Upgrade
        } else {
            BodyDescriptor::from_body(body)
        };
        Self { head, body }
    }

    pub fn head(&self) -> &ResponseHead {
        &self.head
    }

    pub fn body(&self) -> &BodyDescriptor {
        &self.body
    }

    pub fn status(&self) -> StatusCode {
        self.head.status()
    }

    pub fn into_parts(self) -> (ResponseHead, BodyDescriptor) {
        (self.head, self.body)
    }
}
