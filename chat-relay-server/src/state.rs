use chat_relay_agent::ChatRelay;
use chat_relay_core::config::ProviderErrorPolicy;
use chat_relay_core::session::SessionStore;
use std::sync::Arc;

/// Shared by every connection and request handler
#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<ChatRelay>,
    pub error_policy: ProviderErrorPolicy,
}

impl AppState {
    pub fn new(relay: ChatRelay, error_policy: ProviderErrorPolicy) -> Self {
        Self {
            relay: Arc::new(relay),
            error_policy,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        self.relay.sessions()
    }
}
