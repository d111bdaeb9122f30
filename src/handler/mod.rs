//! Request handler module
//!
//! Dispatches inbound requests to the health probe or the relay.

pub mod router;

// Re-export main entry point
pub use router::handle_request;
