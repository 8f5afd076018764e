//! HTTP connection handling module
//!
//! [`HttpConnection`] ties the pieces together for one connection: it reads fully
//! parsed requests, runs their handlers concurrently and writes the responses back
//! through a [`Pipeline`](crate::pipeline::Pipeline) in request order.
//!
//! Request parsing is not part of this crate; any stream of `http::Request`
//! values can feed a connection.

mod http_connection;

pub use http_connection::{HttpConnection, Shutdown};
