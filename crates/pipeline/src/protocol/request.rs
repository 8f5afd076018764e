//! Request metadata the pipeline cares about.
//!
//! Requests reach the pipeline fully read; the only thing the pipeline needs to know
//! about them is whether the connection survives the exchange.

use http::header::CONNECTION;
use http::{HeaderMap, Request, Version};

/// Determines if the connection stays open after answering `request`.
///
/// HTTP/1.1 defaults to keep-alive unless the client sends `Connection: close`,
/// HTTP/1.0 only keeps the connection when the client asks for `Connection: keep-alive`.
pub fn is_keep_alive<B>(request: &Request<B>) -> bool {
    keep_alive(request.version(), request.headers())
}

pub(crate) fn keep_alive(version: Version, headers: &HeaderMap) -> bool {
    let has_token = |token: &str| {
        headers
            .get_all(CONNECTION)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(','))
            .any(|item| item.trim().eq_ignore_ascii_case(token))
    };

    match version {
        Version::HTTP_11 => !has_token("close"),
        Version::HTTP_10 => has_token("keep-alive"),
        _ => false,
    }
}
