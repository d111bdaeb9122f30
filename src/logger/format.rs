//! Access log format module
//!
//! One line per relayed request. Supported formats:
//! - `combined` (Nginx combined, with the `Origin` header in the referer slot)
//! - `common` (Common Log Format - CLF)
//! - `json` (one JSON object per line)
//! - Custom patterns with `$variable` substitution

use chrono::Local;
use serde::Serialize;

/// Access log entry for one inbound request
#[derive(Debug, Clone, Serialize)]
pub struct AccessLogEntry {
    /// Client socket address
    pub remote_addr: String,
    /// Time the request was received
    #[serde(serialize_with = "serialize_time")]
    pub time: chrono::DateTime<Local>,
    pub method: String,
    pub path: String,
    /// HTTP version (1.0, 1.1)
    pub http_version: String,
    /// Status returned to the caller (mirrors the upstream status on success)
    pub status: u16,
    /// Response body size in bytes
    pub body_bytes: usize,
    /// `Origin` header of the browser caller
    pub origin: Option<String>,
    pub user_agent: Option<String>,
    /// Machine-readable error code of the reply, if any
    pub error_code: Option<&'static str>,
    /// Request processing time in microseconds, upstream round trip included
    pub request_time_us: u64,
}

fn serialize_time<S>(time: &chrono::DateTime<Local>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&time.to_rfc3339())
}

impl AccessLogEntry {
    /// Create a new access log entry stamped with the current local time
    pub fn new(remote_addr: String, method: String, path: String) -> Self {
        Self {
            remote_addr,
            time: Local::now(),
            method,
            path,
            http_version: "1.1".to_string(),
            status: 200,
            body_bytes: 0,
            origin: None,
            user_agent: None,
            error_code: None,
            request_time_us: 0,
        }
    }

    /// Render the entry in the given format
    pub fn format(&self, format: &str) -> String {
        match format {
            "combined" => self.format_combined(),
            "common" => self.format_common(),
            "json" => self.format_json(),
            custom => self.format_custom(custom),
        }
    }

    fn request_line(&self) -> String {
        format!("{} {} HTTP/{}", self.method, self.path, self.http_version)
    }

    fn time_local(&self) -> String {
        self.time.format("%d/%b/%Y:%H:%M:%S %z").to_string()
    }

    /// `$remote_addr - - [$time_local] "$request" $status $body_bytes_sent "$http_origin" "$http_user_agent"`
    fn format_combined(&self) -> String {
        format!(
            "{} \"{}\" \"{}\"",
            self.format_common(),
            self.origin.as_deref().unwrap_or("-"),
            self.user_agent.as_deref().unwrap_or("-"),
        )
    }

    /// `$remote_addr - - [$time_local] "$request" $status $body_bytes_sent`
    fn format_common(&self) -> String {
        format!(
            "{} - - [{}] \"{}\" {} {}",
            self.remote_addr,
            self.time_local(),
            self.request_line(),
            self.status,
            self.body_bytes,
        )
    }

    fn format_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| format!(r#"{{"log_error":"{e}"}}"#))
    }

    /// Custom format with variable substitution
    ///
    /// Supported variables:
    /// - `$remote_addr`, `$time_local`, `$time_iso8601`
    /// - `$request` ("METHOD /path HTTP/version"), `$request_method`, `$request_uri`
    /// - `$status`, `$body_bytes_sent`, `$error_code`
    /// - `$http_origin`, `$http_user_agent`
    /// - `$request_time` (seconds, 3 decimal places)
    fn format_custom(&self, pattern: &str) -> String {
        let mut out = String::with_capacity(pattern.len() * 2);
        let mut rest = pattern;

        // Substituted values are never rescanned
        while let Some(pos) = rest.find('$') {
            out.push_str(&rest[..pos]);
            let after = &rest[pos + 1..];
            match CUSTOM_VARIABLES.iter().find(|name| after.starts_with(**name)) {
                Some(name) => {
                    out.push_str(&self.variable(name));
                    rest = &after[name.len()..];
                }
                None => {
                    out.push('$');
                    rest = after;
                }
            }
        }
        out.push_str(rest);
        out
    }

    fn variable(&self, name: &str) -> String {
        match name {
            "remote_addr" => self.remote_addr.clone(),
            "time_local" => self.time_local(),
            "time_iso8601" => self.time.to_rfc3339(),
            "request_time" => {
                #[allow(clippy::cast_precision_loss)]
                let seconds = self.request_time_us as f64 / 1_000_000.0;
                format!("{seconds:.3}")
            }
            "request_method" => self.method.clone(),
            "request_uri" => self.path.clone(),
            "request" => self.request_line(),
            "status" => self.status.to_string(),
            "body_bytes_sent" => self.body_bytes.to_string(),
            "error_code" => self.error_code.unwrap_or("-").to_string(),
            "http_origin" => self.origin.as_deref().unwrap_or("-").to_string(),
            "http_user_agent" => self.user_agent.as_deref().unwrap_or("-").to_string(),
            _ => String::new(),
        }
    }
}

/// Custom format variables; a name that prefixes another comes after it
const CUSTOM_VARIABLES: &[&str] = &[
    "remote_addr",
    "time_local",
    "time_iso8601",
    "request_time",
    "request_method",
    "request_uri",
    "request",
    "status",
    "body_bytes_sent",
    "error_code",
    "http_origin",
    "http_user_agent",
];

#[cfg(test)]
mod tests {
    use super::*;

    fn relay_entry() -> AccessLogEntry {
        let mut entry = AccessLogEntry::new(
            "10.0.0.7:51234".to_string(),
            "POST".to_string(),
            "/kommo-proxy".to_string(),
        );
        entry.status = 500;
        entry.body_bytes = 187;
        entry.origin = Some("https://dashboard.example".to_string());
        entry.user_agent = Some("Mozilla/5.0".to_string());
        entry.error_code = Some("KOMMO_PROXY_ERROR");
        entry.request_time_us = 1234;
        entry
    }

    #[test]
    fn test_format_combined() {
        let log = relay_entry().format("combined");
        assert!(log.starts_with("10.0.0.7:51234 - - ["));
        assert!(log.contains("\"POST /kommo-proxy HTTP/1.1\" 500 187"));
        assert!(log.ends_with("\"https://dashboard.example\" \"Mozilla/5.0\""));
    }

    #[test]
    fn test_format_common_omits_headers() {
        let log = relay_entry().format("common");
        assert!(log.contains("\"POST /kommo-proxy HTTP/1.1\" 500 187"));
        assert!(!log.contains("dashboard.example"));
        assert!(!log.contains("Mozilla"));
    }

    #[test]
    fn test_format_json_is_valid_json() {
        let log = relay_entry().format("json");
        let parsed: serde_json::Value = serde_json::from_str(&log).unwrap();
        assert_eq!(parsed["method"], "POST");
        assert_eq!(parsed["status"], 500);
        assert_eq!(parsed["error_code"], "KOMMO_PROXY_ERROR");
        assert_eq!(parsed["origin"], "https://dashboard.example");
        assert!(parsed["time"].is_string());
    }

    #[test]
    fn test_format_custom() {
        let log = relay_entry().format("$request_method $request_uri $status $error_code $request_time");
        assert_eq!(log, "POST /kommo-proxy 500 KOMMO_PROXY_ERROR 0.001");
    }

    #[test]
    fn test_format_custom_missing_values() {
        let mut entry = relay_entry();
        entry.error_code = None;
        entry.origin = None;
        assert_eq!(entry.format("$error_code|$http_origin"), "-|-");
    }

    #[test]
    fn test_format_custom_does_not_expand_header_values() {
        let mut entry = relay_entry();
        entry.origin = Some("$http_user_agent".to_string());
        assert_eq!(
            entry.format("$http_origin \"$http_user_agent\" $request costs $5"),
            "$http_user_agent \"Mozilla/5.0\" POST /kommo-proxy HTTP/1.1 costs $5"
        );
    }
}
