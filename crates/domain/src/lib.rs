//! Shared types for the ragchat workspace: the error type, the
//! configuration tree and structured trace events.

pub mod config;
pub mod error;
pub mod trace;

pub use error::{Error, Result};
