//! Request routing dispatch module
//!
//! Entry point for inbound HTTP requests: the health probe is answered here,
//! every other request goes through the relay.

use crate::config::AppState;
use crate::http;
use crate::logger::{self, AccessLogEntry};
use crate::relay::{InboundBody, InboundRequest};
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::{Body, Bytes};
use hyper::{Method, Request, Response};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

/// Main entry point for HTTP request handling
///
/// Generic over the body so the full path can be driven without a socket.
pub async fn handle_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
    peer_addr: SocketAddr,
) -> Result<Response<Full<Bytes>>, Infallible>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let started = Instant::now();
    let mut entry = state.config.logging.access_log.then(|| {
        let mut entry = AccessLogEntry::new(
            peer_addr.to_string(),
            req.method().to_string(),
            req.uri().path().to_string(),
        );
        entry.http_version = format_version(req.version()).to_string();
        entry.origin = header_string(&req, "origin");
        entry.user_agent = header_string(&req, "user-agent");
        entry
    });

    let (response, error_code) = route_request(req, &state).await;

    if let Some(entry) = entry.as_mut() {
        entry.status = response.status().as_u16();
        entry.body_bytes = usize::try_from(response.body().size_hint().exact().unwrap_or(0))
            .unwrap_or(usize::MAX);
        entry.error_code = error_code;
        entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
        logger::log_access(entry, &state.config.logging.access_log_format);
    }

    Ok(response)
}

async fn route_request<B>(
    req: Request<B>,
    state: &AppState,
) -> (Response<Full<Bytes>>, Option<&'static str>)
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    if req.method() == Method::GET && req.uri().path() == state.config.http.health_path {
        return (http::build_health_response(), None);
    }

    let method = req.method().clone();
    // Only POST bodies are ever parsed; anything else is rejected before parsing
    let body = if method == Method::POST {
        read_body(req, state.config.http.max_body_size).await
    } else {
        InboundBody::Complete(Bytes::new())
    };

    let reply = state.relay.handle(InboundRequest { method, body }).await;
    (http::build_relay_response(&reply), reply.error_code())
}

/// Collect the request body, bounded by `max_body_size`
///
/// A declared `Content-Length` over the limit is refused without reading.
async fn read_body<B>(req: Request<B>, max_body_size: u64) -> InboundBody
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    if let Some(size) = declared_length(&req) {
        if size > max_body_size {
            return InboundBody::TooLarge {
                limit: max_body_size,
            };
        }
    }

    let limit = usize::try_from(max_body_size).unwrap_or(usize::MAX);
    match Limited::new(req.into_body(), limit).collect().await {
        Ok(collected) => InboundBody::Complete(collected.to_bytes()),
        Err(e) if e.is::<LengthLimitError>() => InboundBody::TooLarge {
            limit: max_body_size,
        },
        Err(e) => InboundBody::Unreadable(e.to_string()),
    }
}

fn declared_length<B>(req: &Request<B>) -> Option<u64> {
    let value = req.headers().get("content-length")?;
    match value.to_str().ok().and_then(|s| s.parse::<u64>().ok()) {
        Some(size) => Some(size),
        None => {
            logger::log_warning(&format!(
                "Invalid Content-Length value: {value:?}, skipping size check"
            ));
            None
        }
    }
}

fn header_string<B>(req: &Request<B>, name: &str) -> Option<String> {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string)
}

const fn format_version(version: hyper::Version) -> &'static str {
    match version {
        hyper::Version::HTTP_10 => "1.0",
        hyper::Version::HTTP_2 => "2",
        _ => "1.1",
    }
}
