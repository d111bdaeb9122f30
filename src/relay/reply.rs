//! Relay reply types
//!
//! What the relay hands back to the HTTP layer: a status plus one of three
//! body shapes. Header decoration is the HTTP layer's job.

use chrono::{SecondsFormat, Utc};
use hyper::StatusCode;
use serde::Serialize;
use serde_json::Value;

/// Current time as ISO-8601 UTC with millisecond precision (`2026-10-16T08:30:00.123Z`)
pub fn iso_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Wrapper around a relayed upstream body
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SuccessEnvelope {
    pub success: bool,
    pub data: Value,
    pub status: u16,
    pub timestamp: String,
}

/// Structured error body shared by every non-success reply
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReplyBody {
    /// CORS preflight answer
    Empty,
    Success(SuccessEnvelope),
    Error(ErrorBody),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelayReply {
    pub status: StatusCode,
    pub body: ReplyBody,
}

impl RelayReply {
    pub const fn preflight() -> Self {
        Self {
            status: StatusCode::OK,
            body: ReplyBody::Empty,
        }
    }

    /// Wrap an upstream body; the HTTP status and the envelope `status` come
    /// from the same value
    pub fn success(upstream_status: StatusCode, data: Value) -> Self {
        Self {
            status: upstream_status,
            body: ReplyBody::Success(SuccessEnvelope {
                success: true,
                data,
                status: upstream_status.as_u16(),
                timestamp: iso_timestamp(),
            }),
        }
    }

    pub const fn error(status: StatusCode, body: ErrorBody) -> Self {
        Self {
            status,
            body: ReplyBody::Error(body),
        }
    }

    /// Error code carried by the body, for access logging
    pub const fn error_code(&self) -> Option<&'static str> {
        match &self.body {
            ReplyBody::Error(body) => body.code,
            ReplyBody::Empty | ReplyBody::Success(_) => None,
        }
    }
}
