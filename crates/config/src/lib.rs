//! Configuration loading, env substitution and validation.
//!
//! Config files: `chatsync.toml`, `chatsync.yaml`, `chatsync.yml` or
//! `chatsync.json`, searched in `./` then the user config directory
//! (`~/.config/chatsync/` on Linux).
//!
//! `${ENV_VAR}` placeholders are substituted before parsing.

pub mod env_subst;
pub mod error;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    error::{Error, Result},
    loader::{LoadedConfig, config_dir, discover_and_load, find_config_file, load_config},
    schema::{ChatType, ChatsyncConfig, DiscordConfig, DumpsConfig, RuneScapeConfig, SyncConfig},
    validate::{Diagnostic, Severity, ValidationResult, validate, validate_value},
};
