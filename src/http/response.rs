//! HTTP response building module
//!
//! Turns relay replies into hyper responses. Every response, success or error,
//! carries the same CORS allowances.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::http::response::Builder;
use hyper::{Response, StatusCode};
use serde::Serialize;

use crate::relay::{RelayReply, ReplyBody};

pub const ALLOW_ORIGIN: &str = "*";
pub const ALLOW_METHODS: &str = "POST, OPTIONS";
pub const ALLOW_HEADERS: &str = "Content-Type, Authorization";

/// Last-resort body when a reply cannot be serialized
const FALLBACK_ERROR_BODY: &str =
    r#"{"error":"Internal server error","message":"The response could not be encoded","code":"KOMMO_PROXY_ERROR"}"#;

fn with_cors(builder: Builder) -> Builder {
    builder
        .header("Access-Control-Allow-Origin", ALLOW_ORIGIN)
        .header("Access-Control-Allow-Methods", ALLOW_METHODS)
        .header("Access-Control-Allow-Headers", ALLOW_HEADERS)
}

/// Build the HTTP response for a relay reply
pub fn build_relay_response(reply: &RelayReply) -> Response<Full<Bytes>> {
    match &reply.body {
        ReplyBody::Empty => build_preflight_response(reply.status),
        ReplyBody::Success(envelope) => build_json_response(reply.status, envelope),
        ReplyBody::Error(body) => build_json_response(reply.status, body),
    }
}

/// Preflight: CORS headers, empty body, no content type
fn build_preflight_response(status: StatusCode) -> Response<Full<Bytes>> {
    with_cors(Response::builder().status(status))
        .body(Full::new(Bytes::new()))
        .unwrap_or_else(|e| {
            log_build_error("OPTIONS", &e);
            Response::new(Full::new(Bytes::new()))
        })
}

/// Build a JSON response with CORS headers
pub fn build_json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    let (status, json) = match serde_json::to_vec(body) {
        Ok(json) => (status, Bytes::from(json)),
        Err(e) => {
            crate::logger::log_error(&format!("Failed to serialize response: {e}"));
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Bytes::from_static(FALLBACK_ERROR_BODY.as_bytes()),
            )
        }
    };

    with_cors(Response::builder().status(status))
        .header("Content-Type", "application/json")
        .body(Full::new(json))
        .unwrap_or_else(|e| {
            log_build_error(status.as_str(), &e);
            Response::new(Full::new(Bytes::from_static(FALLBACK_ERROR_BODY.as_bytes())))
        })
}

/// Build liveness probe response
pub fn build_health_response() -> Response<Full<Bytes>> {
    build_json_response(StatusCode::OK, &serde_json::json!({ "status": "ok" }))
}

/// Log response build error
fn log_build_error(status: &str, error: &hyper::http::Error) {
    crate::logger::log_error(&format!("Failed to build {status} response: {error}"));
}
