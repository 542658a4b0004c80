//! RuneScape game chat over the companion web app, driven through
//! Chrome/Chromium with CDP.
//!
//! The adapter logs in by typing into the app's login form, joins the clan
//! or friends chat, scrapes the message list for new messages and types
//! outgoing lines into the chat input.

pub mod adapter;
pub mod companion;
pub mod detect;
pub mod error;
pub mod launch;

pub use {adapter::RuneScapeAdapter, error::BrowserError};
