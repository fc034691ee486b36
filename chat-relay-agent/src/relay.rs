//! Relay turn: the core processing engine

use chat_relay_core::config::RelayConfig;
use chat_relay_core::session::SessionStore;
use chat_relay_core::utils::preview;
use chat_relay_providers::{LLMProvider, ProviderError};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::context::ContextBuilder;

/// Error type for a relay turn
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Model provider failed: {0}")]
    Provider(#[from] ProviderError),
}

/// Runs turns for any session against one model provider
pub struct ChatRelay {
    sessions: Arc<SessionStore>,
    provider: Arc<dyn LLMProvider>,
    context: ContextBuilder,
    model: String,
    max_tokens: u32,
    temperature: f64,
    max_history_turns: Option<usize>,
}

impl ChatRelay {
    /// Create a relay from the `relay` config section
    pub fn new(
        sessions: Arc<SessionStore>,
        provider: Arc<dyn LLMProvider>,
        config: &RelayConfig,
    ) -> Self {
        Self {
            sessions,
            provider,
            context: ContextBuilder::new(config.system_prompt.clone()),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            max_history_turns: config.max_history_turns,
        }
    }

    /// Override the model id sent with each request
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// Process one user message for `session_id` and return the reply text
    ///
    /// The session is created on first use. Turns on the same session are
    /// serialized; the transcript only changes when the provider succeeds.
    pub async fn process_turn(&self, session_id: &str, text: &str) -> Result<String, RelayError> {
        info!(
            "Processing message for session {}: {} (model: {})",
            session_id,
            preview(text, 80),
            self.model
        );

        let session = self.sessions.get_or_create(session_id);
        let turn = session.begin_turn().await;

        let history = turn.history(self.max_history_turns);
        let messages = self.context.build_messages(&history, text);
        debug!(
            "Built context for {}: {} history messages",
            session_id,
            history.len()
        );

        let response = self
            .provider
            .chat(
                messages,
                Some(self.model.clone()),
                self.max_tokens,
                self.temperature,
            )
            .await
            .map_err(|e| {
                warn!("Provider call failed for session {}: {}", session_id, e);
                e
            })?;

        let reply = response
            .text()
            .ok_or_else(|| {
                ProviderError::InvalidResponse("model returned an empty reply".to_string())
            })?
            .to_string();

        let turns = turn.record_turn(text, reply.as_str());

        info!(
            "Response to {} (turn {}): {}",
            session_id,
            turns,
            preview(&reply, 120)
        );
        Ok(reply)
    }
}
