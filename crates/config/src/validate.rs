//! Configuration validation.
//!
//! Detects unknown or misspelled fields, type errors, unresolved
//! placeholders and settings the bridge cannot run with.

use std::{collections::BTreeMap, num::NonZeroU64, path::PathBuf};

use secrecy::ExposeSecret;

use crate::{env_subst::unresolved, loader::LoadedConfig, schema::ChatsyncConfig};

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// "unknown-field", "type-error", "missing", "invalid" or "env"
    pub category: &'static str,
    /// Dotted path, e.g. "discord.channel_id"
    pub path: String,
    pub message: String,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}: {}", self.severity, self.message)
        } else {
            write!(f, "{} [{}]: {}", self.severity, self.path, self.message)
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
    pub config_path: Option<PathBuf>,
}

impl ValidationResult {
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }

    fn push(&mut self, severity: Severity, category: &'static str, path: &str, message: String) {
        self.diagnostics.push(Diagnostic {
            severity,
            category,
            path: path.to_string(),
            message,
        });
    }
}

/// Expected shape of one table in the config tree.
enum KnownKeys {
    Table(BTreeMap<&'static str, KnownKeys>),
    Leaf,
}

fn table<const N: usize>(entries: [(&'static str, KnownKeys); N]) -> KnownKeys {
    KnownKeys::Table(BTreeMap::from(entries))
}

fn leaves<const N: usize>(names: [&'static str; N]) -> KnownKeys {
    KnownKeys::Table(names.into_iter().map(|n| (n, KnownKeys::Leaf)).collect())
}

fn schema_map() -> KnownKeys {
    table([
        (
            "runescape",
            leaves([
                "username",
                "password",
                "chat_type",
                "command_prefix",
                "url",
                "max_message_len",
                "headless",
                "chrome_path",
                "chrome_args",
                "navigation_timeout_ms",
            ]),
        ),
        (
            "discord",
            leaves([
                "token",
                "channel_id",
                "bot_id",
                "command_prefix",
                "ready_timeout_secs",
            ]),
        ),
        (
            "sync",
            leaves([
                "idle_poll_ms",
                "confirm_timeout_ms",
                "confirm_poll_ms",
                "restart_backoff_initial_ms",
                "restart_backoff_max_ms",
            ]),
        ),
        ("dumps", leaves(["html_dir", "screenshot_dir", "error_dir"])),
    ])
}

fn levenshtein(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut row: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.chars().enumerate() {
        let mut diagonal = row[0];
        row[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let above = row[j + 1];
            row[j + 1] = (diagonal + usize::from(ca != *cb))
                .min(above + 1)
                .min(row[j] + 1);
            diagonal = above;
        }
    }
    row[b.len()]
}

fn suggest<'a>(needle: &str, candidates: impl IntoIterator<Item = &'a str>) -> Option<&'a str> {
    candidates
        .into_iter()
        .map(|c| (levenshtein(needle, c), c))
        .filter(|(d, _)| (1..=3).contains(d))
        .min_by_key(|(d, _)| *d)
        .map(|(_, c)| c)
}

fn check_unknown_fields(
    value: &serde_json::Value,
    schema: &KnownKeys,
    prefix: &str,
    result: &mut ValidationResult,
) {
    let (serde_json::Value::Object(map), KnownKeys::Table(fields)) = (value, schema) else {
        return;
    };
    for (key, child) in map {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match fields.get(key.as_str()) {
            Some(child_schema) => check_unknown_fields(child, child_schema, &path, result),
            None => {
                let message = match suggest(key, fields.keys().copied()) {
                    Some(s) => format!("unknown field (did you mean \"{s}\"?)"),
                    None => "unknown field".to_string(),
                };
                result.push(Severity::Error, "unknown-field", &path, message);
            },
        }
    }
}

fn check_placeholders(value: &serde_json::Value, prefix: &str, result: &mut ValidationResult) {
    match value {
        serde_json::Value::String(s) => {
            for name in unresolved(s) {
                result.push(
                    Severity::Warning,
                    "env",
                    prefix,
                    format!("environment variable {name} is not set"),
                );
            }
        },
        serde_json::Value::Object(map) => {
            for (key, child) in map {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                check_placeholders(child, &path, result);
            }
        },
        serde_json::Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                check_placeholders(item, &format!("{prefix}[{i}]"), result);
            }
        },
        _ => {},
    }
}

/// Discord ids are non-zero 64-bit integers.
fn is_snowflake(id: &str) -> bool {
    id.chars().all(|c| c.is_ascii_digit()) && id.parse::<NonZeroU64>().is_ok()
}

fn check_semantics(config: &ChatsyncConfig, result: &mut ValidationResult) {
    let rs = &config.runescape;
    if rs.username.trim().is_empty() {
        result.push(
            Severity::Error,
            "missing",
            "runescape.username",
            "RuneScape username is required".into(),
        );
    }
    if rs
        .password
        .as_ref()
        .is_none_or(|p| p.expose_secret().is_empty())
    {
        result.push(
            Severity::Error,
            "missing",
            "runescape.password",
            "RuneScape password is required".into(),
        );
    }
    if rs.command_prefix.trim().is_empty() {
        result.push(
            Severity::Error,
            "invalid",
            "runescape.command_prefix",
            "command prefix must not be empty".into(),
        );
    }
    if rs.max_message_len < 10 {
        result.push(
            Severity::Error,
            "invalid",
            "runescape.max_message_len",
            format!("{} is too short to relay anything useful", rs.max_message_len),
        );
    }
    if !rs.url.starts_with("http://") && !rs.url.starts_with("https://") {
        result.push(
            Severity::Error,
            "invalid",
            "runescape.url",
            "must be an http(s) URL".into(),
        );
    }
    if let Some(chrome) = &rs.chrome_path
        && !chrome.exists()
    {
        result.push(
            Severity::Warning,
            "invalid",
            "runescape.chrome_path",
            format!("{} does not exist", chrome.display()),
        );
    }

    let discord = &config.discord;
    if discord
        .token
        .as_ref()
        .is_none_or(|t| t.expose_secret().trim().is_empty())
    {
        result.push(
            Severity::Error,
            "missing",
            "discord.token",
            "Discord bot token is required".into(),
        );
    }
    if discord.channel_id.trim().is_empty() {
        result.push(
            Severity::Error,
            "missing",
            "discord.channel_id",
            "Discord channel id is required".into(),
        );
    } else if !is_snowflake(discord.channel_id.trim()) {
        result.push(
            Severity::Error,
            "invalid",
            "discord.channel_id",
            format!("\"{}\" is not a valid Discord id", discord.channel_id),
        );
    }
    if let Some(bot_id) = &discord.bot_id
        && !is_snowflake(bot_id.trim())
    {
        result.push(
            Severity::Error,
            "invalid",
            "discord.bot_id",
            format!("\"{bot_id}\" is not a valid Discord id"),
        );
    }
    if discord.command_prefix.trim().is_empty() {
        result.push(
            Severity::Error,
            "invalid",
            "discord.command_prefix",
            "command prefix must not be empty".into(),
        );
    }

    let sync = &config.sync;
    for (path, value) in [
        ("sync.idle_poll_ms", sync.idle_poll_ms),
        ("sync.confirm_timeout_ms", sync.confirm_timeout_ms),
        ("sync.confirm_poll_ms", sync.confirm_poll_ms),
        ("sync.restart_backoff_initial_ms", sync.restart_backoff_initial_ms),
    ] {
        if value == 0 {
            result.push(Severity::Error, "invalid", path, "must be greater than 0".into());
        }
    }
    if sync.confirm_poll_ms > sync.confirm_timeout_ms {
        result.push(
            Severity::Warning,
            "invalid",
            "sync.confirm_poll_ms",
            "longer than confirm_timeout_ms; sends will only be checked once".into(),
        );
    }
    if sync.restart_backoff_max_ms < sync.restart_backoff_initial_ms {
        result.push(
            Severity::Warning,
            "invalid",
            "sync.restart_backoff_max_ms",
            "smaller than restart_backoff_initial_ms; the initial delay is used".into(),
        );
    }
}

/// Validate a loaded config: its raw tree and its typed form.
#[must_use]
pub fn validate(loaded: &LoadedConfig) -> ValidationResult {
    let mut result = ValidationResult {
        config_path: loaded.path.clone(),
        ..ValidationResult::default()
    };
    if loaded.path.is_none() {
        result.push(
            Severity::Info,
            "missing",
            "",
            "no config file found; using defaults".into(),
        );
    }
    check_unknown_fields(&loaded.value, &schema_map(), "", &mut result);
    check_placeholders(&loaded.value, "", &mut result);
    check_semantics(&loaded.config, &mut result);
    result
}

/// Validate an untyped tree, reporting type errors instead of failing.
#[must_use]
pub fn validate_value(value: &serde_json::Value) -> ValidationResult {
    let mut result = ValidationResult::default();
    check_unknown_fields(value, &schema_map(), "", &mut result);
    check_placeholders(value, "", &mut result);
    match serde_json::from_value::<ChatsyncConfig>(value.clone()) {
        Ok(config) => check_semantics(&config, &mut result),
        Err(e) => result.push(Severity::Error, "type-error", "", format!("type error: {e}")),
    }
    result
}
