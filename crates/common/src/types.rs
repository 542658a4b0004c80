use std::{fmt, str::FromStr};

use {
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
};

use crate::Error;

/// One of the two chat surfaces bridged by the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Service {
    /// The in-game clan/friends chat, reached through the companion web app.
    RuneScape,
    /// A Discord text channel, reached through a bot session.
    Discord,
}

impl Service {
    pub const ALL: [Service; 2] = [Service::RuneScape, Service::Discord];

    /// The service messages from `self` are relayed to.
    #[must_use]
    pub fn opposite(self) -> Self {
        match self {
            Self::RuneScape => Self::Discord,
            Self::Discord => Self::RuneScape,
        }
    }

    /// Stable lowercase identifier, used in config, logs and operator commands.
    #[must_use]
    pub fn id(self) -> &'static str {
        match self {
            Self::RuneScape => "runescape",
            Self::Discord => "discord",
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::RuneScape => "RuneScape",
            Self::Discord => "Discord",
        })
    }
}

impl FromStr for Service {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "runescape" => Ok(Self::RuneScape),
            "discord" => Ok(Self::Discord),
            _ => Err(Error::unknown_service(s)),
        }
    }
}

/// A single unit moving through the relay.
///
/// Messages are never deduplicated: two messages with identical fields are
/// still relayed twice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayMessage {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl RelayMessage {
    /// A bare message with no author and no timestamp, e.g. a canned reply.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            author: None,
            timestamp: None,
        }
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Length of the text in characters (not bytes).
    #[must_use]
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}
