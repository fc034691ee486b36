//! Core types and traits for chat-relay
//!
//! This crate provides the error type, configuration, logging setup and the
//! in-memory session store shared by the other chat-relay crates.

pub mod config;
pub mod error;
pub mod logging;
pub mod session;
pub mod utils;

pub use error::{Error, Result};
