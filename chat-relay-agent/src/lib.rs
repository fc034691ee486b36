//! Turn processing for chat-relay
//!
//! This crate assembles the provider context for a session and runs one
//! relay turn: build context, call the model, record the turn.

pub mod context;
pub mod relay;

pub use context::ContextBuilder;
pub use relay::{ChatRelay, RelayError};
