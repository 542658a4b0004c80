use std::error::Error as StdError;

/// Crate-wide result type for adapter operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Typed adapter errors. The relay engine turns these into supervisor state
/// transitions; none of them reach the coordinator.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The chat surface refused the session (account logged in elsewhere,
    /// invalid bot token). Not retried automatically.
    #[error("connection rejected: {reason}")]
    ConnectRejected { reason: String },

    /// Session establishment failed for a reason worth retrying.
    #[error("connection failed: {reason}")]
    ConnectFailed { reason: String },

    /// A single read failed; the next poll may succeed.
    #[error("transient read failure: {message}")]
    TransientRead { message: String },

    /// The session is structurally gone.
    #[error("session disconnected: {message}")]
    Disconnected { message: String },

    #[error("send failed: {message}")]
    Send { message: String },

    #[error("diagnostic capture failed: {message}")]
    Capture { message: String },

    /// Operation needs a live session or is not supported by this surface.
    #[error("operation unavailable: {message}")]
    Unavailable { message: String },

    /// Wrapped source error from an external dependency.
    #[error("{context}: {source}")]
    External {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
}

impl Error {
    #[must_use]
    pub fn connect_rejected(reason: impl std::fmt::Display) -> Self {
        Self::ConnectRejected {
            reason: reason.to_string(),
        }
    }

    #[must_use]
    pub fn connect_failed(reason: impl std::fmt::Display) -> Self {
        Self::ConnectFailed {
            reason: reason.to_string(),
        }
    }

    #[must_use]
    pub fn transient_read(message: impl std::fmt::Display) -> Self {
        Self::TransientRead {
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn disconnected(message: impl std::fmt::Display) -> Self {
        Self::Disconnected {
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn send(message: impl std::fmt::Display) -> Self {
        Self::Send {
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn capture(message: impl std::fmt::Display) -> Self {
        Self::Capture {
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn unavailable(message: impl std::fmt::Display) -> Self {
        Self::Unavailable {
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn external(
        context: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::External {
            context: context.into(),
            source: Box::new(source),
        }
    }

    /// Whether a connect error should park the supervisor until an operator
    /// restart instead of retrying.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ConnectRejected { .. })
    }
}
