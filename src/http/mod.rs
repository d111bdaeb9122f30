//! HTTP protocol layer module
//!
//! Response construction shared by the relay route and the health probe.

pub mod response;

// Re-export commonly used types
pub use response::{build_health_response, build_relay_response};
