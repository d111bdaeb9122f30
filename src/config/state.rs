// Application state module
// Shared, read-only runtime state handed to every connection task

use std::sync::Arc;

use super::types::Config;
use crate::relay::{Relay, Upstream};

/// Application state
///
/// Built once at startup. Nothing in here is mutated afterwards, so it is
/// shared across connection tasks without locks.
pub struct AppState {
    pub config: Config,
    pub relay: Relay,
}

impl AppState {
    pub fn new(config: Config, upstream: Arc<dyn Upstream>) -> Self {
        let relay = Relay::new(&config.upstream, upstream);
        Self { config, relay }
    }
}
