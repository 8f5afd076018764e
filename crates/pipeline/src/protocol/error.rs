use std::error::Error;
use std::io;
use thiserror::Error;

/// Boxed error produced by handlers and response body sources.
pub type BoxError = Box<dyn Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("request error: {source}")]
    RequestError { source: BoxError },

    #[error("response error: {source}")]
    ResponseError {
        #[from]
        source: SendError,
    },
}

impl HttpError {
    pub fn request<E: Into<BoxError>>(e: E) -> Self {
        Self::RequestError { source: e.into() }
    }
}

#[derive(Error, Debug)]
pub enum SendError {
    /// the response body source failed while being drained
    #[error("response body error: {source}")]
    Body { source: BoxError },

    /// the body does not fit the framing that was already committed
    #[error("invalid body: {reason}")]
    InvalidBody { reason: String },

    /// the wire broke
    #[error("channel write failure: {source}")]
    ChannelWrite {
        #[from]
        source: io::Error,
    },

    #[error("connection already closed")]
    ConnectionClosed,

    /// the handler side dropped the call without producing a response
    #[error("response abandoned before it was produced")]
    ResponseAbandoned,
}

impl SendError {
    pub fn invalid_body<S: ToString>(str: S) -> Self {
        Self::InvalidBody { reason: str.to_string() }
    }

    pub fn body<E: Into<BoxError>>(e: E) -> Self {
        Self::Body { source: e.into() }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::ChannelWrite { source: e.into() }
    }

    /// Returns true when the failure came from the transport rather than from the application.
    pub fn is_transport_fault(&self) -> bool {
        matches!(self, SendError::ChannelWrite { .. } | SendError::ConnectionClosed)
    }
}
