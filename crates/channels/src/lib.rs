//! Chat surface adapters and plugin scripts.
//!
//! Each chat surface (the RuneScape companion app, a Discord channel)
//! implements [`ChatAdapter`]. The relay engine only ever talks to a surface
//! through this trait. Plugin commands implement [`ChatScript`] and are
//! collected into an immutable [`CommandTable`] before the relay starts.

pub mod adapter;
pub mod error;
pub mod plugin;

pub use {
    adapter::{
        CURSOR_START, ChatAdapter, Credentials, Diagnostics, InboundMessage, OutboundProfile,
        PollOutcome,
    },
    error::{Error, Result},
    plugin::{
        ChatScript, CommandTable, CommandTableBuilder, MessageSink, ScriptContext, ScriptInvocation,
        invoke_script,
    },
};
