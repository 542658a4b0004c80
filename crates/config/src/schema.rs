//! Config schema types.

use std::{fmt, num::NonZeroU64, path::PathBuf, time::Duration};

use {
    secrecy::Secret,
    serde::{Deserialize, Serialize},
};

/// Root configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ChatsyncConfig {
    pub runescape: RuneScapeConfig,
    pub discord: DiscordConfig,
    pub sync: SyncConfig,
    pub dumps: DumpsConfig,
}

/// Which in-game chat the bridge joins.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatType {
    #[default]
    Clan,
    Friends,
}

impl fmt::Display for ChatType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Clan => "clan",
            Self::Friends => "friends",
        })
    }
}

/// `[runescape]`: the companion app login and browser settings.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct RuneScapeConfig {
    pub username: String,
    pub password: Option<Secret<String>>,
    pub chat_type: ChatType,
    pub command_prefix: String,
    /// Companion app URL.
    pub url: String,
    /// Longest line the game accepts, author prefix included.
    pub max_message_len: usize,
    pub headless: bool,
    /// Chromium binary. Auto-detected when unset.
    pub chrome_path: Option<PathBuf>,
    pub chrome_args: Vec<String>,
    pub navigation_timeout_ms: u64,
}

impl fmt::Debug for RuneScapeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuneScapeConfig")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("chat_type", &self.chat_type)
            .field("command_prefix", &self.command_prefix)
            .field("url", &self.url)
            .field("max_message_len", &self.max_message_len)
            .field("headless", &self.headless)
            .field("chrome_path", &self.chrome_path)
            .field("chrome_args", &self.chrome_args)
            .field("navigation_timeout_ms", &self.navigation_timeout_ms)
            .finish()
    }
}

impl Default for RuneScapeConfig {
    fn default() -> Self {
        Self {
            username: String::new(),
            password: None,
            chat_type: ChatType::default(),
            command_prefix: ".".into(),
            url: "https://www.runescape.com/companion/comapp.ws".into(),
            max_message_len: 80,
            headless: true,
            chrome_path: None,
            chrome_args: Vec::new(),
            navigation_timeout_ms: 30_000,
        }
    }
}

impl RuneScapeConfig {
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }
}

/// `[discord]`: bot session and relay channel.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct DiscordConfig {
    pub token: Option<Secret<String>>,
    /// Channel messages are relayed to and from.
    pub channel_id: String,
    /// Messages from this user are never relayed. Defaults to the bot itself.
    pub bot_id: Option<String>,
    pub command_prefix: String,
    pub ready_timeout_secs: u64,
}

impl fmt::Debug for DiscordConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiscordConfig")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("channel_id", &self.channel_id)
            .field("bot_id", &self.bot_id)
            .field("command_prefix", &self.command_prefix)
            .field("ready_timeout_secs", &self.ready_timeout_secs)
            .finish()
    }
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            token: None,
            channel_id: String::new(),
            bot_id: None,
            command_prefix: "!".into(),
            ready_timeout_secs: 30,
        }
    }
}

impl DiscordConfig {
    /// `None` unless the id parses as a non-zero integer.
    pub fn channel_id(&self) -> Option<NonZeroU64> {
        self.channel_id.trim().parse().ok()
    }

    pub fn bot_id(&self) -> Option<NonZeroU64> {
        self.bot_id.as_deref().and_then(|id| id.trim().parse().ok())
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_secs(self.ready_timeout_secs)
    }
}

/// `[sync]`: relay timing.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub idle_poll_ms: u64,
    pub confirm_timeout_ms: u64,
    pub confirm_poll_ms: u64,
    pub restart_backoff_initial_ms: u64,
    pub restart_backoff_max_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            idle_poll_ms: 600,
            confirm_timeout_ms: 2_000,
            confirm_poll_ms: 50,
            restart_backoff_initial_ms: 1_000,
            restart_backoff_max_ms: 60_000,
        }
    }
}

/// `[dumps]`: where snapshots and failure diagnostics are written.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DumpsConfig {
    pub html_dir: PathBuf,
    pub screenshot_dir: PathBuf,
    pub error_dir: PathBuf,
}

impl Default for DumpsConfig {
    fn default() -> Self {
        Self {
            html_dir: PathBuf::from("dumps/html"),
            screenshot_dir: PathBuf::from("dumps/screenshots"),
            error_dir: PathBuf::from("dumps/errors"),
        }
    }
}
