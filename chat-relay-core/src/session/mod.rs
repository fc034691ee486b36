//! Session management for conversation history
//!
//! Every session id maps to one append-only transcript. Sessions live in
//! memory for as long as their [`SessionStore`] does.

pub mod store;
pub mod transcript;

pub use store::{Session, SessionHandle, SessionInfo, SessionStore};
pub use transcript::{ChatMessage, Role, Transcript};
