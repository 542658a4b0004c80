//! Shared types and error definitions used across all chatsync crates.

pub mod error;
pub mod types;

pub use {
    error::{Error, Result},
    types::{RelayMessage, Service},
};
