//! Ordered response pipelining for HTTP/1.1 connections
//!
//! A client may send several requests on one connection without waiting for the
//! responses. Their handlers run concurrently and finish in any order, yet HTTP/1.1
//! requires the responses on the wire in the order the requests arrived. This crate
//! takes care of that write side: it queues one call per request, writes each
//! response only once every earlier one is complete, streams large bodies with
//! backpressure and batches flushes so a burst of small responses costs a single
//! socket write.
//!
//! # Example
//!
//! ```no_run
//! use std::convert::Infallible;
//! use std::sync::Arc;
//!
//! use futures::stream;
//! use http::{Request, Response};
//! use micro_pipeline::connection::HttpConnection;
//! use micro_pipeline::handler::make_handler;
//! use tracing::{error, info};
//!
//! async fn hello(request: Request<()>) -> Result<Response<String>, Infallible> {
//!     info!(path = request.uri().path(), "handle request");
//!     Ok(Response::new("Hello World!\r\n".to_owned()))
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let requests = stream::iter(vec![
//!         Ok::<_, Infallible>(Request::builder().uri("/a").body(()).unwrap()),
//!         Ok(Request::builder().uri("/b").body(()).unwrap()),
//!     ]);
//!
//!     let connection = HttpConnection::new(requests, tokio::io::stdout());
//!     match connection.process(Arc::new(make_handler(hello))).await {
//!         Ok(_) => info!("finished process, connection shutdown"),
//!         Err(e) => error!("service has error, cause {}, connection shutdown", e),
//!     }
//! }
//! ```
//!
//! # Architecture
//!
//! - [`protocol`]: response descriptors, wire messages and errors
//! - [`codec`]: HTTP/1.1 response framing
//! - [`transport`]: the write side of a connection
//! - [`pipeline`]: calls, the pending queue, flush batching and the engine
//! - [`handler`]: request handler traits and utilities
//! - [`connection`]: drives a connection from a stream of requests
//!
//! # Error Handling
//!
//! - [`protocol::HttpError`]: top-level error of a connection
//! - [`protocol::SendError`]: response sending errors, including body and transport faults
//!
//! # Limitations
//!
//! - HTTP/1.1 only
//! - requests have to be parsed by the caller

pub mod codec;
pub mod connection;
pub mod handler;
pub mod pipeline;
pub mod protocol;
pub mod transport;

mod utils;
pub(crate) use utils::ensure;
