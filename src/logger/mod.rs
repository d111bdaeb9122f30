//! Logger module
//!
//! Logging utilities for the relay:
//! - Server lifecycle logging
//! - Relay outcome logging (never credentials or payload contents)
//! - Access logging with multiple formats
//! - File-based logging support

mod format;
pub mod writer;

pub use format::AccessLogEntry;

use crate::config::Config;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU8, Ordering};

const LEVEL_ERROR: u8 = 0;
const LEVEL_WARN: u8 = 1;
const LEVEL_INFO: u8 = 2;

static MAX_LEVEL: AtomicU8 = AtomicU8::new(LEVEL_INFO);

/// Map a configured level name to its threshold; unknown names mean `info`
fn parse_level(level: &str) -> u8 {
    match level.to_ascii_lowercase().as_str() {
        "error" => LEVEL_ERROR,
        "warn" | "warning" => LEVEL_WARN,
        _ => LEVEL_INFO,
    }
}

fn enabled(level: u8) -> bool {
    level <= MAX_LEVEL.load(Ordering::Relaxed)
}

/// Initialize the logger with configuration
///
/// Should be called once at application startup.
pub fn init(config: &Config) -> std::io::Result<()> {
    MAX_LEVEL.store(parse_level(&config.logging.level), Ordering::Relaxed);
    writer::init(
        config.logging.access_log_file.as_deref(),
        config.logging.error_log_file.as_deref(),
    )
}

fn write_info(message: &str) {
    if !enabled(LEVEL_INFO) {
        return;
    }
    match writer::get() {
        Some(w) => w.write_info(message),
        None => println!("{message}"),
    }
}

fn write_error(level: u8, message: &str) {
    if !enabled(level) {
        return;
    }
    match writer::get() {
        Some(w) => w.write_error(message),
        None => eprintln!("{message}"),
    }
}

/// Access lines bypass the level filter; `logging.access_log` gates them
fn write_access(message: &str) {
    match writer::get() {
        Some(w) => w.write_access(message),
        None => println!("{message}"),
    }
}

pub fn log_server_start(addr: &SocketAddr, config: &Config) {
    write_info("======================================");
    write_info("Kommo relay started successfully");
    write_info(&format!("Listening on: http://{addr}"));
    write_info(&format!("Log level: {}", config.logging.level));
    if let Some(workers) = config.server.workers {
        write_info(&format!("Worker threads: {workers}"));
    }
    if let Some(ref path) = config.logging.access_log_file {
        write_info(&format!("Access log: {path}"));
    }
    if let Some(ref path) = config.logging.error_log_file {
        write_info(&format!("Error log: {path}"));
    }
    write_info(&format!("Max body size: {} bytes", config.http.max_body_size));
    write_info(&format!("Health probe: GET {}", config.http.health_path));
    match config.upstream.credentials() {
        Some(creds) => write_info(&format!("Upstream: {}", creds.base_url)),
        None => log_missing_credentials(),
    }
    write_info("======================================\n");
}

pub fn log_info(message: &str) {
    write_info(&format!("[INFO] {message}"));
}

pub fn log_connection_error(err: &impl std::fmt::Debug) {
    write_error(LEVEL_ERROR, &format!("[ERROR] Failed to serve connection: {err:?}"));
}

pub fn log_error(message: &str) {
    write_error(LEVEL_ERROR, &format!("[ERROR] {message}"));
}

pub fn log_warning(message: &str) {
    write_error(LEVEL_WARN, &format!("[WARN] {message}"));
}

pub fn log_missing_credentials() {
    log_error("[CONFIG] Upstream base URL or access token is not configured (KOMMO_BASE_URL / KOMMO_ACCESS_TOKEN)");
}

/// Successful relay: endpoint and upstream status only
pub fn log_relay_success(endpoint: &str, status: u16) {
    write_info(&relay_success_line(endpoint, status));
}

/// Failed relay: error message, endpoint when known, and the failure time
pub fn log_relay_failure(message: &str, endpoint: Option<&str>, timestamp: &str) {
    write_error(LEVEL_ERROR, &relay_failure_line(message, endpoint, timestamp));
}

// `endpoint` is caller input; Debug formatting escapes control characters so it
// always stays on one line
fn relay_success_line(endpoint: &str, status: u16) -> String {
    format!("[RELAY] {endpoint:?} - Status: {status}")
}

fn relay_failure_line(message: &str, endpoint: Option<&str>, timestamp: &str) -> String {
    match endpoint {
        Some(endpoint) => {
            format!("[RELAY ERROR] {message} (endpoint: {endpoint:?}, at: {timestamp})")
        }
        None => format!("[RELAY ERROR] {message} (endpoint: -, at: {timestamp})"),
    }
}

/// Rejected request: a caller mistake, not a relay fault
pub fn log_rejected(status: u16, reason: &str) {
    write_error(LEVEL_WARN, &format!("[RELAY] Rejected with {status}: {reason}"));
}

/// Log formatted access log entry
pub fn log_access(entry: &AccessLogEntry, format: &str) {
    write_access(&entry.format(format));
}

pub fn log_shutdown_started(active: usize) {
    write_info(&format!(
        "[SHUTDOWN] Stopped accepting connections, {active} still active"
    ));
}

pub fn log_shutdown_complete(remaining: usize) {
    if remaining == 0 {
        write_info("[SHUTDOWN] All connections drained");
    } else {
        log_warning(&format!(
            "[SHUTDOWN] Grace period elapsed with {remaining} connection(s) still open"
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("error"), LEVEL_ERROR);
        assert_eq!(parse_level("WARN"), LEVEL_WARN);
        assert_eq!(parse_level("warning"), LEVEL_WARN);
        assert_eq!(parse_level("info"), LEVEL_INFO);
        assert_eq!(parse_level("debug"), LEVEL_INFO);
    }

    #[test]
    fn test_relay_lines_escape_endpoint() {
        let forged = "/leads\n[RELAY] /admin - Status: 200";
        let line = relay_success_line(forged, 200);
        assert!(!line.contains('\n'));
        assert_eq!(line, r#"[RELAY] "/leads\n[RELAY] /admin - Status: 200" - Status: 200"#);

        let line = relay_failure_line("upstream request failed", Some("/leads\r\nx"), "t");
        assert!(!line.contains('\n') && !line.contains('\r'));
        assert!(line.contains(r#""/leads\r\nx""#));
    }

    #[test]
    fn test_relay_failure_without_endpoint() {
        assert_eq!(
            relay_failure_line("boom", None, "2026-01-01T00:00:00.000Z"),
            "[RELAY ERROR] boom (endpoint: -, at: 2026-01-01T00:00:00.000Z)"
        );
    }
}
