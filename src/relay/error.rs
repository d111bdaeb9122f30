//! Relay failure taxonomy
//!
//! Each variant maps to one HTTP status and one caller-visible error body.
//! The `Display` text is for server-side logs only and never reaches the caller.

use hyper::{Method, StatusCode};

use super::reply::ErrorBody;
use super::upstream::UpstreamError;

pub const MISSING_ENV_CONFIG: &str = "MISSING_ENV_CONFIG";
pub const KOMMO_PROXY_ERROR: &str = "KOMMO_PROXY_ERROR";
pub const PAYLOAD_TOO_LARGE: &str = "PAYLOAD_TOO_LARGE";

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("method not allowed: {0}")]
    MethodNotAllowed(Method),
    #[error("upstream credentials are not configured")]
    MissingConfig,
    #[error("request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: u64 },
    #[error("request body could not be read: {0}")]
    UnreadableBody(String),
    #[error("request body is not valid JSON: {0}")]
    MalformedBody(#[source] serde_json::Error),
    #[error("request payload has no endpoint")]
    MissingEndpoint,
    #[error("invalid upstream method {0:?}")]
    InvalidMethod(String),
    #[error("configured access token is not a valid header value")]
    InvalidAccessToken,
    #[error("upstream answered {0}, which cannot carry the reply envelope")]
    BodilessStatus(StatusCode),
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

impl RelayError {
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::UnreadableBody(_) | Self::MalformedBody(_) | Self::MissingEndpoint => {
                StatusCode::BAD_REQUEST
            }
            Self::MissingConfig
            | Self::InvalidMethod(_)
            | Self::InvalidAccessToken
            | Self::BodilessStatus(_)
            | Self::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable code, if the failure class carries one
    pub const fn code(&self) -> Option<&'static str> {
        match self {
            Self::MissingConfig => Some(MISSING_ENV_CONFIG),
            Self::PayloadTooLarge { .. } => Some(PAYLOAD_TOO_LARGE),
            Self::InvalidMethod(_)
            | Self::InvalidAccessToken
            | Self::BodilessStatus(_)
            | Self::Upstream(_) => Some(KOMMO_PROXY_ERROR),
            Self::MethodNotAllowed(_)
            | Self::UnreadableBody(_)
            | Self::MalformedBody(_)
            | Self::MissingEndpoint => None,
        }
    }

    /// Internal failures are logged as errors; everything else is the caller's to fix
    pub fn is_internal(&self) -> bool {
        self.status().is_server_error()
    }

    /// Caller-visible body; carries no detail from the underlying error
    pub fn to_body(&self, timestamp: &str) -> ErrorBody {
        let (error, message) = match self {
            Self::MethodNotAllowed(_) => ("Method not allowed", "Only POST requests are accepted"),
            Self::MissingConfig => (
                "Server configuration incomplete",
                "Contact the system administrator",
            ),
            Self::PayloadTooLarge { .. } => (
                "Payload too large",
                "The request body exceeds the allowed size",
            ),
            Self::UnreadableBody(_) | Self::MalformedBody(_) => (
                "Invalid data format",
                "The request body must be valid JSON",
            ),
            Self::MissingEndpoint => (
                "Endpoint not specified",
                "The Kommo endpoint to query must be specified",
            ),
            Self::InvalidMethod(_)
            | Self::InvalidAccessToken
            | Self::BodilessStatus(_)
            | Self::Upstream(_) => (
                "Internal server error",
                "The request to Kommo CRM could not be processed",
            ),
        };

        ErrorBody {
            error,
            message,
            code: self.code(),
            timestamp: matches!(self.code(), Some(KOMMO_PROXY_ERROR)).then(|| timestamp.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_and_code_table() {
        let cases = [
            (RelayError::MethodNotAllowed(Method::GET), 405, None),
            (RelayError::MissingConfig, 500, Some(MISSING_ENV_CONFIG)),
            (RelayError::PayloadTooLarge { limit: 10 }, 413, Some(PAYLOAD_TOO_LARGE)),
            (RelayError::MissingEndpoint, 400, None),
            (RelayError::InvalidMethod("G E T".into()), 500, Some(KOMMO_PROXY_ERROR)),
            (RelayError::BodilessStatus(StatusCode::NO_CONTENT), 500, Some(KOMMO_PROXY_ERROR)),
        ];
        for (err, status, code) in cases {
            assert_eq!(err.status().as_u16(), status, "{err}");
            assert_eq!(err.code(), code, "{err}");
        }
    }

    #[test]
    fn test_malformed_body_is_client_error() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err = RelayError::MalformedBody(parse_err);
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(!err.is_internal());
    }

    #[test]
    fn test_body_never_contains_internal_detail() {
        let err = RelayError::InvalidMethod("secret-detail".into());
        let body = serde_json::to_string(&err.to_body("2026-01-01T00:00:00.000Z")).unwrap();
        assert!(!body.contains("secret-detail"));
        assert!(body.contains(KOMMO_PROXY_ERROR));
        assert!(body.contains("2026-01-01T00:00:00.000Z"));
    }

    #[test]
    fn test_timestamp_only_on_proxy_errors() {
        let body = RelayError::MissingConfig.to_body("t");
        assert!(body.timestamp.is_none());
        let body = RelayError::MissingEndpoint.to_body("t");
        assert!(body.code.is_none());
        assert!(body.timestamp.is_none());
    }
}
