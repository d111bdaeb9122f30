//! Outbound side of the relay
//!
//! `Upstream` is the seam between the relay pipeline and the network. The
//! production implementation wraps a shared `reqwest::Client`; one attempt per
//! call, client default timeouts, no retry.

use async_trait::async_trait;
use hyper::body::Bytes;
use hyper::header::HeaderMap;
use hyper::{Method, StatusCode};

/// Fully built outbound call
#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<String>,
}

/// Raw upstream answer; decoding is the relay's job
#[derive(Debug, Clone)]
pub struct UpstreamReply {
    pub status: StatusCode,
    pub body: Bytes,
}

#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("upstream request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("upstream call failed: {0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

#[async_trait]
pub trait Upstream: Send + Sync {
    async fn send(&self, request: UpstreamRequest) -> Result<UpstreamReply, UpstreamError>;
}

/// HTTP client for the upstream CRM API
#[derive(Clone)]
pub struct ReqwestUpstream {
    client: reqwest::Client,
}

impl ReqwestUpstream {
    pub fn new() -> Result<Self, UpstreamError> {
        Ok(Self::with_client(reqwest::Client::builder().build()?))
    }

    pub const fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Upstream for ReqwestUpstream {
    async fn send(&self, request: UpstreamRequest) -> Result<UpstreamReply, UpstreamError> {
        // base_url + endpoint is not guaranteed to form a valid URL
        let url = reqwest::Url::parse(&request.url)
            .map_err(|e| UpstreamError::Other(Box::new(e)))?;
        let mut builder = self
            .client
            .request(request.method, url)
            .headers(request.headers);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let body = response.bytes().await?;
        Ok(UpstreamReply { status, body })
    }
}
