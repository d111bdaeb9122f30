//! Relay payload parsing
//!
//! The inbound body is `{ endpoint, method?, data? }`. `data` is opaque: it is
//! forwarded as-is and never inspected.

use hyper::Method;
use serde_json::{Map, Value};

use super::error::RelayError;

#[derive(Debug, Clone, PartialEq)]
pub struct ProxyPayload {
    /// Path appended verbatim to the upstream base URL
    pub endpoint: String,
    /// Upstream method as sent by the caller; `GET` when absent
    pub method: Option<String>,
    /// Upstream request body; absent and `null` both mean "no body"
    pub data: Option<Value>,
}

impl ProxyPayload {
    /// Parse and validate a raw request body
    pub fn parse(body: &[u8]) -> Result<Self, RelayError> {
        let value: Value = serde_json::from_slice(body).map_err(RelayError::MalformedBody)?;
        match value {
            Value::Object(map) => Self::from_map(map),
            _ => Err(RelayError::MissingEndpoint),
        }
    }

    fn from_map(mut map: Map<String, Value>) -> Result<Self, RelayError> {
        let endpoint = match map.remove("endpoint") {
            Some(Value::String(s)) if !s.is_empty() => s,
            _ => return Err(RelayError::MissingEndpoint),
        };

        let method = match map.remove("method") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) if s.is_empty() => None,
            Some(Value::String(s)) => Some(s),
            Some(other) => return Err(RelayError::InvalidMethod(other.to_string())),
        };

        let data = map.remove("data").filter(|v| !v.is_null());

        Ok(Self {
            endpoint,
            method,
            data,
        })
    }

    /// Method for the upstream call, upper-cased
    pub fn upstream_method(&self) -> Result<Method, RelayError> {
        match &self.method {
            None => Ok(Method::GET),
            Some(m) => Method::from_bytes(m.to_ascii_uppercase().as_bytes())
                .map_err(|_| RelayError::InvalidMethod(m.clone())),
        }
    }

    /// Upstream request body: the serialized `data`, if any
    pub fn upstream_body(&self) -> Option<String> {
        self.data.as_ref().map(Value::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_full_payload() {
        let p = ProxyPayload::parse(br#"{"endpoint":"/leads","method":"POST","data":{"name":"x"}}"#)
            .unwrap();
        assert_eq!(p.endpoint, "/leads");
        assert_eq!(p.upstream_method().unwrap(), Method::POST);
        assert_eq!(p.data, Some(json!({"name": "x"})));
        assert_eq!(p.upstream_body().as_deref(), Some(r#"{"name":"x"}"#));
    }

    #[test]
    fn test_method_defaults_to_get() {
        let p = ProxyPayload::parse(br#"{"endpoint":"/leads"}"#).unwrap();
        assert_eq!(p.upstream_method().unwrap(), Method::GET);
        let p = ProxyPayload::parse(br#"{"endpoint":"/leads","method":""}"#).unwrap();
        assert_eq!(p.upstream_method().unwrap(), Method::GET);
    }

    #[test]
    fn test_method_is_uppercased() {
        let p = ProxyPayload::parse(br#"{"endpoint":"/leads","method":"patch"}"#).unwrap();
        assert_eq!(p.upstream_method().unwrap(), Method::PATCH);
    }

    #[test]
    fn test_invalid_method() {
        let p = ProxyPayload::parse(br#"{"endpoint":"/leads","method":"GE T"}"#).unwrap();
        assert!(matches!(p.upstream_method(), Err(RelayError::InvalidMethod(_))));
        assert!(matches!(
            ProxyPayload::parse(br#"{"endpoint":"/leads","method":7}"#),
            Err(RelayError::InvalidMethod(_))
        ));
    }

    #[test]
    fn test_missing_endpoint_variants() {
        for body in [
            r"{}",
            r#"{"method":"GET"}"#,
            r#"{"endpoint":""}"#,
            r#"{"endpoint":null}"#,
            r#"{"endpoint":42}"#,
            r#"["/leads"]"#,
            r"null",
        ] {
            assert!(
                matches!(ProxyPayload::parse(body.as_bytes()), Err(RelayError::MissingEndpoint)),
                "{body}"
            );
        }
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            ProxyPayload::parse(b"{not json"),
            Err(RelayError::MalformedBody(_))
        ));
        assert!(matches!(
            ProxyPayload::parse(b""),
            Err(RelayError::MalformedBody(_))
        ));
    }

    #[test]
    fn test_null_data_means_no_body() {
        let p = ProxyPayload::parse(br#"{"endpoint":"/leads","data":null}"#).unwrap();
        assert_eq!(p.upstream_body(), None);
    }

    #[test]
    fn test_falsy_data_is_forwarded() {
        let p = ProxyPayload::parse(br#"{"endpoint":"/leads","data":0}"#).unwrap();
        assert_eq!(p.upstream_body().as_deref(), Some("0"));
    }
}
