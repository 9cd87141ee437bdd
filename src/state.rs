//! Shared application state.

use std::sync::Arc;

use crate::config::ServerConfig;
use crate::core::bridge::{RealtimeLinkFactory, SessionRegistry};

/// State shared by every handler.
pub struct AppState {
    pub config: ServerConfig,
    pub sessions: SessionRegistry,
}

impl AppState {
    /// Build the state with a registry that connects to the configured realtime endpoint.
    pub async fn new(config: ServerConfig) -> Arc<Self> {
        let sessions = SessionRegistry::new(config.bridge_settings(), config.max_sessions);
        Arc::new(Self { config, sessions })
    }

    /// Build the state with a custom realtime link factory.
    pub fn with_link_factory(config: ServerConfig, link_factory: RealtimeLinkFactory) -> Arc<Self> {
        let sessions = SessionRegistry::with_link_factory(
            config.bridge_settings(),
            config.max_sessions,
            link_factory,
        );
        Arc::new(Self { config, sessions })
    }
}
