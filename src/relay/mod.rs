//! Request relay
//!
//! Turns one inbound call into at most one upstream call against the CRM API,
//! injecting the configured bearer token. Stages run in a fixed order and the
//! first failing stage decides the reply:
//!
//! 1. `OPTIONS` preflight short-circuit
//! 2. method check (`POST` only)
//! 3. upstream credentials check
//! 4. body size / readability
//! 5. JSON parse and `endpoint` validation
//! 6. upstream call and response wrap
//!
//! Stateless: nothing outlives a single `handle` call.

mod error;
mod payload;
mod reply;
mod upstream;

use hyper::body::Bytes;
use hyper::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use hyper::{Method, StatusCode};
use serde_json::Value;
use std::sync::Arc;

use crate::config::{UpstreamConfig, UpstreamCredentials, DEFAULT_USER_AGENT};
use crate::logger;

pub use error::{RelayError, KOMMO_PROXY_ERROR, MISSING_ENV_CONFIG, PAYLOAD_TOO_LARGE};
pub use payload::ProxyPayload;
pub use reply::{iso_timestamp, ErrorBody, RelayReply, ReplyBody, SuccessEnvelope};
pub use upstream::{ReqwestUpstream, Upstream, UpstreamError, UpstreamReply, UpstreamRequest};

/// Inbound body as collected by the HTTP layer
#[derive(Debug, Clone)]
pub enum InboundBody {
    Complete(Bytes),
    /// The body exceeded the configured limit and was not buffered
    TooLarge { limit: u64 },
    /// The connection failed while the body was being read
    Unreadable(String),
}

/// One inbound call; caller headers are deliberately not part of it
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub method: Method,
    pub body: InboundBody,
}

#[cfg(test)]
impl InboundRequest {
    pub fn new(method: Method, body: impl Into<Bytes>) -> Self {
        Self {
            method,
            body: InboundBody::Complete(body.into()),
        }
    }
}

pub struct Relay {
    credentials: Option<UpstreamCredentials>,
    user_agent: HeaderValue,
    upstream: Arc<dyn Upstream>,
}

impl Relay {
    pub fn new(config: &UpstreamConfig, upstream: Arc<dyn Upstream>) -> Self {
        let user_agent = HeaderValue::from_str(&config.user_agent).unwrap_or_else(|_| {
            logger::log_warning(&format!(
                "Invalid upstream.user_agent {:?}, using {DEFAULT_USER_AGENT}",
                config.user_agent
            ));
            HeaderValue::from_static(DEFAULT_USER_AGENT)
        });

        Self {
            credentials: config.credentials(),
            user_agent,
            upstream,
        }
    }

    /// Run the full pipeline; every failure becomes a structured reply
    pub async fn handle(&self, request: InboundRequest) -> RelayReply {
        if request.method == Method::OPTIONS {
            return RelayReply::preflight();
        }

        let (credentials, payload) = match self.validate(request) {
            Ok(validated) => validated,
            Err(err) => return reject(&err, None),
        };

        match self.forward(credentials, &payload).await {
            Ok(reply) => reply,
            Err(err) => reject(&err, Some(&payload.endpoint)),
        }
    }

    /// Stages 2-5: everything that can fail without touching the network
    fn validate(
        &self,
        request: InboundRequest,
    ) -> Result<(&UpstreamCredentials, ProxyPayload), RelayError> {
        if request.method != Method::POST {
            return Err(RelayError::MethodNotAllowed(request.method));
        }

        let credentials = self.credentials.as_ref().ok_or(RelayError::MissingConfig)?;

        let body = match request.body {
            InboundBody::Complete(bytes) => bytes,
            InboundBody::TooLarge { limit } => return Err(RelayError::PayloadTooLarge { limit }),
            InboundBody::Unreadable(reason) => return Err(RelayError::UnreadableBody(reason)),
        };

        let payload = ProxyPayload::parse(&body)?;
        Ok((credentials, payload))
    }

    async fn forward(
        &self,
        credentials: &UpstreamCredentials,
        payload: &ProxyPayload,
    ) -> Result<RelayReply, RelayError> {
        let request = self.build_upstream_request(credentials, payload)?;
        let reply = self.upstream.send(request).await?;
        if !can_carry_envelope(reply.status) {
            return Err(RelayError::BodilessStatus(reply.status));
        }
        let data = decode_upstream_body(&payload.endpoint, &reply.body);

        logger::log_relay_success(&payload.endpoint, reply.status.as_u16());
        Ok(RelayReply::success(reply.status, data))
    }

    /// URL is `base_url + endpoint` verbatim; headers are built from configuration only
    fn build_upstream_request(
        &self,
        credentials: &UpstreamCredentials,
        payload: &ProxyPayload,
    ) -> Result<UpstreamRequest, RelayError> {
        let method = payload.upstream_method()?;

        let mut authorization =
            HeaderValue::from_str(&format!("Bearer {}", credentials.access_token))
                .map_err(|_| RelayError::InvalidAccessToken)?;
        authorization.set_sensitive(true);

        let mut headers = HeaderMap::with_capacity(3);
        headers.insert(AUTHORIZATION, authorization);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, self.user_agent.clone());

        Ok(UpstreamRequest {
            method,
            url: format!("{}{}", credentials.base_url, payload.endpoint),
            headers,
            body: payload.upstream_body(),
        })
    }
}

/// The reply mirrors the upstream status, so 1xx, 204 and 304 would lose
/// their body on the wire
fn can_carry_envelope(status: StatusCode) -> bool {
    !(status.is_informational()
        || status == StatusCode::NO_CONTENT
        || status == StatusCode::NOT_MODIFIED)
}

/// JSON when it parses, `null` when empty, the raw text otherwise
fn decode_upstream_body(endpoint: &str, body: &[u8]) -> Value {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Value::Null;
    }
    serde_json::from_slice(body).unwrap_or_else(|e| {
        logger::log_warning(&format!(
            "[RELAY] Non-JSON upstream body from {endpoint} ({e}), relaying as text"
        ));
        Value::String(String::from_utf8_lossy(body).into_owned())
    })
}

fn reject(err: &RelayError, endpoint: Option<&str>) -> RelayReply {
    let timestamp = iso_timestamp();
    if err.is_internal() {
        logger::log_relay_failure(&err.to_string(), endpoint, &timestamp);
    } else {
        logger::log_rejected(err.status().as_u16(), &err.to_string());
    }
    RelayReply::error(err.status(), err.to_body(&timestamp))
}

#[cfg(test)]
pub mod testing {
    //! Recording fake for the `Upstream` seam

    use super::*;
    use async_trait::async_trait;
    use hyper::StatusCode;
    use std::sync::Mutex;
    use std::time::Duration;

    pub enum Behavior {
        Reply(StatusCode, &'static str),
        Fail(&'static str),
    }

    pub struct RecordingUpstream {
        behavior: Behavior,
        delay: Duration,
        calls: Mutex<Vec<UpstreamRequest>>,
    }

    impl RecordingUpstream {
        pub fn replying(status: StatusCode, body: &'static str) -> Arc<Self> {
            Self::replying_after(status, body, Duration::ZERO)
        }

        /// Answers like `replying`, but only after `delay`
        pub fn replying_after(status: StatusCode, body: &'static str, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                behavior: Behavior::Reply(status, body),
                delay,
                calls: Mutex::new(Vec::new()),
            })
        }

        pub fn failing(message: &'static str) -> Arc<Self> {
            Arc::new(Self {
                behavior: Behavior::Fail(message),
                delay: Duration::ZERO,
                calls: Mutex::new(Vec::new()),
            })
        }

        pub fn calls(&self) -> Vec<UpstreamRequest> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Upstream for RecordingUpstream {
        async fn send(&self, request: UpstreamRequest) -> Result<UpstreamReply, UpstreamError> {
            self.calls.lock().unwrap().push(request);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            match self.behavior {
                Behavior::Reply(status, body) => Ok(UpstreamReply {
                    status,
                    body: Bytes::from_static(body.as_bytes()),
                }),
                Behavior::Fail(message) => Err(UpstreamError::Other(message.into())),
            }
        }
    }

    pub fn upstream_config(base_url: Option<&str>, access_token: Option<&str>) -> UpstreamConfig {
        UpstreamConfig {
            base_url: base_url.map(String::from),
            access_token: access_token.map(String::from),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    pub fn configured_relay(upstream: &Arc<RecordingUpstream>) -> Relay {
        Relay::new(
            &upstream_config(Some("https://x.example/api/v4"), Some("abc")),
            Arc::clone(upstream) as Arc<dyn Upstream>,
        )
    }
}
