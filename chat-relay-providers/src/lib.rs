//! LLM provider integrations for chat-relay
//!
//! This crate provides the provider abstraction used by the relay and an
//! OpenAI-compatible HTTP client that talks to hosted model APIs.

pub mod base;
pub mod openai_compat;
pub mod registry;

pub use base::{LLMProvider, LLMResponse, Message, ProviderError, ProviderResult};
pub use openai_compat::OpenAICompatClient;
pub use registry::{ProviderRegistry, ProviderSpec};
