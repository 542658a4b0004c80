//! Discord channel adapter over a serenity bot session.

pub mod adapter;
pub mod buffer;
pub mod format;
pub mod handler;
pub mod normalize;

pub use adapter::DiscordAdapter;
