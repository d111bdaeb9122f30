// Configuration module entry point
// Loads the relay configuration once at startup and holds the shared runtime state

mod state;
mod types;

use std::net::SocketAddr;

// Re-export public types
pub use state::AppState;
pub use types::{Config, UpstreamConfig, UpstreamCredentials, DEFAULT_USER_AGENT};

/// Default config file (without extension)
pub const DEFAULT_CONFIG_PATH: &str = "relay";

/// Environment variable holding the upstream base URL
pub const BASE_URL_ENV: &str = "KOMMO_BASE_URL";
/// Environment variable holding the upstream bearer token
pub const ACCESS_TOKEN_ENV: &str = "KOMMO_ACCESS_TOKEN";

impl Config {
    /// Load configuration from `relay.toml` (optional) and the process environment
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from specified file path (without extension)
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        Self::load_with_env(config_path, |name| std::env::var(name).ok())
    }

    /// Load configuration, resolving the upstream credentials through `lookup`
    ///
    /// `KOMMO_BASE_URL` / `KOMMO_ACCESS_TOKEN` win over `[upstream]` in the file.
    /// Empty values are ignored so that a blank variable does not hide the file.
    pub fn load_with_env<F>(config_path: &str, lookup: F) -> Result<Self, config::ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.is_empty());

        let settings = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(
                config::Environment::with_prefix("RELAY")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8888)?
            .set_default("logging.level", "info")?
            .set_default("logging.access_log", true)?
            .set_default("performance.keep_alive_timeout", 75)?
            .set_default("performance.connection_timeout", 30)?
            .set_default("performance.shutdown_grace_period", 10)?
            .set_default("http.max_body_size", 1_048_576)? // 1MB
            .set_default("http.health_path", "/healthz")?
            .set_default("upstream.user_agent", DEFAULT_USER_AGENT)?
            .set_override_option("upstream.base_url", non_empty(BASE_URL_ENV))?
            .set_override_option("upstream.access_token", non_empty(ACCESS_TOKEN_ENV))?
            .build()?;

        settings.try_deserialize()
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| format!("Invalid address: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MISSING_FILE: &str = "does-not-exist/relay";

    #[test]
    fn test_defaults_without_file() {
        let cfg = Config::load_with_env(MISSING_FILE, |_| None).unwrap();
        assert_eq!(cfg.server.host, "127.0.0.1");
        assert_eq!(cfg.server.port, 8888);
        assert_eq!(cfg.http.max_body_size, 1_048_576);
        assert_eq!(cfg.http.health_path, "/healthz");
        assert_eq!(cfg.logging.access_log_format, "combined");
        assert_eq!(cfg.upstream.user_agent, DEFAULT_USER_AGENT);
        assert!(cfg.upstream.credentials().is_none());
        assert_eq!(cfg.get_socket_addr().unwrap().port(), 8888);
    }

    #[test]
    fn test_credentials_from_environment() {
        let cfg = Config::load_with_env(MISSING_FILE, |name| match name {
            BASE_URL_ENV => Some("https://x.example/api/v4".to_string()),
            ACCESS_TOKEN_ENV => Some("abc".to_string()),
            _ => None,
        })
        .unwrap();
        let creds = cfg.upstream.credentials().unwrap();
        assert_eq!(creds.base_url, "https://x.example/api/v4");
        assert_eq!(creds.access_token, "abc");
    }

    #[test]
    fn test_empty_environment_value_is_absent() {
        let cfg = Config::load_with_env(MISSING_FILE, |name| match name {
            BASE_URL_ENV => Some("https://x.example/api/v4".to_string()),
            ACCESS_TOKEN_ENV => Some(String::new()),
            _ => None,
        })
        .unwrap();
        assert!(cfg.upstream.access_token.is_none());
        assert!(cfg.upstream.credentials().is_none());
    }

    #[test]
    fn test_example_config_parses() {
        let cfg: Config = toml::from_str(include_str!("../../relay.example.toml")).unwrap();
        assert_eq!(cfg.server.port, 8888);
        assert_eq!(cfg.http.health_path, "/healthz");
        // credentials come from the environment, never from the sample file
        assert!(cfg.upstream.credentials().is_none());
    }
}
