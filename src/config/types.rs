// Configuration types module
// Defines all configuration-related data structures

use serde::{Deserialize, Serialize};

/// User agent sent on every upstream call unless overridden
pub const DEFAULT_USER_AGENT: &str = "CENYCA-Docentes-Monitor/1.0 (Codex)";

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub performance: PerformanceConfig,
    pub http: HttpConfig,
    pub upstream: UpstreamConfig,
}

/// Server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

/// Logging configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub access_log: bool,
    /// Access log format (combined, common, json, or custom pattern)
    #[serde(default = "default_access_log_format")]
    pub access_log_format: String,
    /// Access log file path (optional, stdout if not set)
    #[serde(default)]
    pub access_log_file: Option<String>,
    /// Error log file path (optional, stderr if not set)
    #[serde(default)]
    pub error_log_file: Option<String>,
}

#[allow(clippy::missing_const_for_fn)]
fn default_access_log_format() -> String {
    "combined".to_string()
}

/// Performance configuration
#[derive(Debug, Deserialize, Clone)]
pub struct PerformanceConfig {
    pub keep_alive_timeout: u64,
    /// Upper bound in seconds on a whole inbound connection, upstream wait included
    pub connection_timeout: u64,
    pub max_connections: Option<u64>,
    /// Seconds to wait for in-flight connections on shutdown
    pub shutdown_grace_period: u64,
}

/// HTTP configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct HttpConfig {
    pub max_body_size: u64,
    pub health_path: String,
}

/// Upstream CRM configuration
///
/// `base_url` and `access_token` are optional here: a relay without them still
/// starts and answers every `POST` with `MISSING_ENV_CONFIG`.
#[derive(Deserialize, Clone)]
pub struct UpstreamConfig {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

#[allow(clippy::missing_const_for_fn)]
fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

// The token must never reach a log line through `{:?}`
impl std::fmt::Debug for UpstreamConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamConfig")
            .field("base_url", &self.base_url)
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

impl UpstreamConfig {
    /// Both values present and non-empty, or nothing
    pub fn credentials(&self) -> Option<UpstreamCredentials> {
        let base_url = self.base_url.as_deref().filter(|s| !s.is_empty())?;
        let access_token = self.access_token.as_deref().filter(|s| !s.is_empty())?;
        Some(UpstreamCredentials {
            base_url: base_url.to_string(),
            access_token: access_token.to_string(),
        })
    }
}

/// Validated upstream base URL and bearer token
#[derive(Clone, PartialEq, Eq)]
pub struct UpstreamCredentials {
    pub base_url: String,
    pub access_token: String,
}

impl std::fmt::Debug for UpstreamCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamCredentials")
            .field("base_url", &self.base_url)
            .field("access_token", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upstream(base_url: Option<&str>, access_token: Option<&str>) -> UpstreamConfig {
        UpstreamConfig {
            base_url: base_url.map(String::from),
            access_token: access_token.map(String::from),
            user_agent: default_user_agent(),
        }
    }

    #[test]
    fn test_credentials_present() {
        let creds = upstream(Some("https://x.example/api/v4"), Some("abc"))
            .credentials()
            .unwrap();
        assert_eq!(creds.base_url, "https://x.example/api/v4");
        assert_eq!(creds.access_token, "abc");
    }

    #[test]
    fn test_credentials_missing_or_empty() {
        assert!(upstream(None, Some("abc")).credentials().is_none());
        assert!(upstream(Some("https://x.example"), None).credentials().is_none());
        assert!(upstream(Some(""), Some("abc")).credentials().is_none());
        assert!(upstream(Some("https://x.example"), Some("")).credentials().is_none());
    }

    #[test]
    fn test_debug_redacts_token() {
        let cfg = upstream(Some("https://x.example"), Some("super-secret"));
        assert!(!format!("{cfg:?}").contains("super-secret"));
        let creds = cfg.credentials().unwrap();
        assert!(!format!("{creds:?}").contains("super-secret"));
    }
}
