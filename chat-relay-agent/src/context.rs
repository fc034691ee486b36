//! Context builder for assembling prompts

use chat_relay_core::session::ChatMessage;
use chat_relay_providers::Message;

/// Builds the message list sent to the model for one turn
#[derive(Debug, Clone)]
pub struct ContextBuilder {
    system_prompt: String,
}

impl ContextBuilder {
    /// Create a new context builder
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
        }
    }

    /// Build the complete message list for an LLM call:
    /// system instruction, then the transcript, then the new user message.
    pub fn build_messages(&self, history: &[ChatMessage], current_message: &str) -> Vec<Message> {
        let mut messages = Vec::with_capacity(history.len() + 2);

        messages.push(Message::system(&self.system_prompt));
        messages.extend(history.iter().map(Message::from));
        messages.push(Message::user(current_message));

        messages
    }
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self::new("You are a helpful AI assistant.")
    }
}
