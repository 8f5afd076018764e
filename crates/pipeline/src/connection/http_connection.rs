use std::sync::Arc;

use bytes::Bytes;
use futures::{FutureExt, Stream, StreamExt};
use http::header::UPGRADE;
use http::{Request, StatusCode};
use http_body::Body;
use tokio::io::AsyncWrite;
use tracing::{debug, error, info};

use crate::handler::Handler;
use crate::pipeline::{Call, Pipeline, PipelineConfig, PipelineHandle, PipelineMetrics, PipelineOutcome};
use crate::protocol::{BoxError, HttpError, ResponseDescriptor, is_keep_alive};
use crate::transport::FramedTransport;

/// How a connection ended.
#[derive(Debug)]
pub enum Shutdown<W> {
    Closed,
    /// the connection switched protocol, the writer is handed back untouched
    Upgraded(W),
}

/// An HTTP/1.1 connection answering pipelined requests in order.
///
/// `HttpConnection` drives both sides of a connection on the current task:
/// - reading requests from `requests` and submitting one [`Call`] per request
/// - running every request's handler in its own task
/// - writing the responses back through a [`Pipeline`] in request order
///
/// # Type Parameters
///
/// * `S`: stream of fully read requests
/// * `W`: the async writable half of the connection
///
pub struct HttpConnection<S, W> {
    requests: S,
    writer: W,
    config: PipelineConfig,
    metrics: Option<triomphe::Arc<PipelineMetrics>>,
}

impl<S, W> HttpConnection<S, W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(requests: S, writer: W) -> Self {
        Self { requests, writer, config: PipelineConfig::default(), metrics: None }
    }

    #[must_use]
    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Reports into shared metrics instead of per-connection ones.
    #[must_use]
    pub fn with_metrics(mut self, metrics: triomphe::Arc<PipelineMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub async fn process<H, B, E>(self, handler: Arc<H>) -> Result<Shutdown<W>, HttpError>
    where
        S: Stream<Item = Result<Request<B>, E>> + Unpin,
        E: Into<BoxError>,
        B: Send + 'static,
        H: Handler<B> + 'static,
        H::RespBody: Body<Data = Bytes> + Send + 'static,
        <H::RespBody as Body>::Error: Into<BoxError>,
    {
        let Self { mut requests, writer, config, metrics } = self;

        let transport =
            FramedTransport::with_capacity(writer, config.write_buffer_capacity(), config.write_backpressure_boundary());
        let metrics = metrics.unwrap_or_else(|| triomphe::Arc::new(PipelineMetrics::new()));
        let (pipeline, handle) = Pipeline::with_metrics(transport, config, metrics);

        let read_result = {
            tokio::pin! {
                let engine = pipeline.run();
                let read_loop = read_requests(&mut requests, handle, handler);
            }

            let mut read_result = None;
            let outcome = loop {
                tokio::select! {
                    // the engine ends the connection, the read loop only feeds it
                    biased;
                    outcome = &mut engine => break outcome,
                    result = &mut read_loop, if read_result.is_none() => read_result = Some(result),
                }
            };

            match outcome? {
                PipelineOutcome::Upgraded(transport) => return Ok(Shutdown::Upgraded(transport.into_inner())),
                PipelineOutcome::Closed | PipelineOutcome::Cancelled => read_result,
            }
        };

        match read_result {
            Some(Err(e)) => Err(e),
            _ => {
                info!("connection closed");
                Ok(Shutdown::Closed)
            }
        }
    }
}

/// Reads requests and submits their calls until the stream ends or the connection should stop reading.
async fn read_requests<S, B, E, H>(requests: &mut S, mut handle: PipelineHandle, handler: Arc<H>) -> Result<(), HttpError>
where
    S: Stream<Item = Result<Request<B>, E>> + Unpin,
    E: Into<BoxError>,
    B: Send + 'static,
    H: Handler<B> + 'static,
    H::RespBody: Body<Data = Bytes> + Send + 'static,
    <H::RespBody as Body>::Error: Into<BoxError>,
{
    loop {
        let Some(mut next) = requests.next().await else {
            debug!("no more requests on this connection");
            return Ok(());
        };

        handle.notify_read_started().await?;
        loop {
            let request = match next {
                Ok(request) => request,
                Err(e) => {
                    let e = e.into();
                    error!(cause = %e, "can't receive next request");
                    // responses already finished must still reach the client
                    if handle.notify_read_stopped().await.is_err() {
                        debug!("pipeline is gone before the read error");
                    }
                    return Err(HttpError::request(e));
                }
            };

            if !dispatch(&mut handle, &handler, request).await? {
                handle.notify_read_stopped().await?;
                return Ok(());
            }

            // keep going while requests are already there, the burst ends as soon as the stream would wait
            match requests.next().now_or_never() {
                Some(Some(item)) => next = item,
                Some(None) => {
                    handle.notify_read_stopped().await?;
                    debug!("no more requests on this connection");
                    return Ok(());
                }
                None => break,
            }
        }
        handle.notify_read_stopped().await?;
    }
}

/// Submits the call of one request and spawns its handler, returns whether reading should go on.
async fn dispatch<B, H>(handle: &mut PipelineHandle, handler: &Arc<H>, request: Request<B>) -> Result<bool, HttpError>
where
    B: Send + 'static,
    H: Handler<B> + 'static,
    H::RespBody: Body<Data = Bytes> + Send + 'static,
    <H::RespBody as Body>::Error: Into<BoxError>,
{
    let keep_alive = is_keep_alive(&request);
    // bytes after an upgrade request may belong to the new protocol
    let upgrade = request.headers().contains_key(UPGRADE);
    let (call, responder) = Call::new(keep_alive);

    let handler = Arc::clone(handler);
    let task = tokio::spawn(async move {
        let response = match handler.call(request).await {
            Ok(response) => ResponseDescriptor::from_response(response),
            Err(e) => {
                let e: BoxError = e.into();
                error!(cause = %e, "handle response error");
                ResponseDescriptor::empty(StatusCode::INTERNAL_SERVER_ERROR)
            }
        };

        if responder.respond(response).is_err() {
            debug!("call disposed before its response was ready");
        }
    });

    handle.submit(call.with_task(task.abort_handle())).await?;

    if !keep_alive {
        debug!("request is not keep-alive, stop reading");
        return Ok(false);
    }
    if upgrade {
        debug!("upgrade requested, stop reading");
        return Ok(false);
    }
    Ok(true)
}
