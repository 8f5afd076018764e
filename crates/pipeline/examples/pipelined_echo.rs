//! A line based toy protocol served with pipelined HTTP/1.1 responses.
//!
//! Every line sent to the server is taken as the path of a `GET` request. Paths made of
//! digits sleep that many milliseconds before answering, `/stream` answers with a chunked
//! body. Try sending several lines at once:
//!
//! ```text
//! printf '/300\n/0\n/stream\n' | nc 127.0.0.1 8080
//! ```
//!
//! The responses come back in the order of the lines, whatever the delays.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::{StreamExt, stream};
use http::{Request, Response};
use http_body::Frame;
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full, StreamBody};
use micro_pipeline::connection::{HttpConnection, Shutdown};
use micro_pipeline::handler::make_handler;
use micro_pipeline::protocol::BoxError;
use tokio::net::TcpListener;
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    info!(port = 8080, "start listening");
    let tcp_listener = match TcpListener::bind("127.0.0.1:8080").await {
        Ok(tcp_listener) => tcp_listener,
        Err(e) => {
            error!(cause = %e, "bind server error");
            return;
        }
    };

    let handler = Arc::new(make_handler(echo));

    loop {
        let (tcp_stream, _remote_addr) = match tcp_listener.accept().await {
            Ok(stream_and_addr) => stream_and_addr,
            Err(e) => {
                warn!(cause = %e, "failed to accept");
                continue;
            }
        };

        let handler = Arc::clone(&handler);

        tokio::spawn(async move {
            let (reader, writer) = tcp_stream.into_split();
            let requests = FramedRead::new(reader, LinesCodec::new()).map(|line: Result<String, LinesCodecError>| -> Result<Request<()>, BoxError> {
                let line = line?;
                Request::builder().uri(line.trim()).body(()).map_err(BoxError::from)
            });

            let connection = HttpConnection::new(requests, writer);
            match connection.process(handler).await {
                Ok(Shutdown::Closed) => info!("finished process, connection shutdown"),
                Ok(Shutdown::Upgraded(_)) => warn!("the echo protocol never upgrades"),
                Err(e) => error!("service has error, cause {}, connection shutdown", e),
            }
        });
    }
}

async fn echo(request: Request<()>) -> Result<Response<BoxBody<Bytes, Infallible>>, BoxError> {
    let path = request.uri().path().to_owned();
    info!(path = %path, "handle request");

    if path == "/stream" {
        let frames = stream::iter((0..5).map(|i| Ok(Frame::data(Bytes::from(format!("chunk {i}\n"))))));
        return Ok(Response::new(BodyExt::boxed(StreamBody::new(frames))));
    }

    if let Ok(millis) = path.trim_start_matches('/').parse() {
        tokio::time::sleep(Duration::from_millis(millis)).await;
    }
    Ok(Response::new(Full::new(Bytes::from(format!("{path}\n"))).boxed()))
}
