use std::fmt;

use {
    async_trait::async_trait,
    chatsync_common::Service,
    chrono::{DateTime, Utc},
    secrecy::Secret,
};

use crate::{Error, Result};

/// Cursor value that means "nothing seen yet in this session".
pub const CURSOR_START: i64 = -1;

/// Credentials handed to [`ChatAdapter::connect`].
#[derive(Clone)]
pub enum Credentials {
    /// Game account login typed into the companion app.
    Account {
        username: String,
        password: Secret<String>,
    },
    /// Bot token.
    Token(Secret<String>),
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Account { username, .. } => f
                .debug_struct("Account")
                .field("username", username)
                .field("password", &"[REDACTED]")
                .finish(),
            Self::Token(_) => f.debug_tuple("Token").field(&"[REDACTED]").finish(),
        }
    }
}

/// Constraints the send loop applies when draining towards an adapter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutboundProfile {
    /// Maximum rendered length in characters, including an `"<author>: "`
    /// prefix. `None` means unbounded.
    pub max_len: Option<usize>,
    /// Confirm each send by watching [`ChatAdapter::count_sent_messages`].
    pub confirm_delivery: bool,
}

/// A message discovered on the source surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Per-session index, strictly increasing.
    pub index: i64,
    pub text: String,
    pub author: Option<String>,
}

/// Result of one ingestion poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Message(InboundMessage),
    /// Nothing new. `cursor` is the value the next poll should use; it can be
    /// lower than the one passed in when the source history shrank.
    Idle { cursor: i64 },
    /// The chat surface is gone; the session has to be re-established.
    Disconnected,
}

/// Best-effort state dump taken when a session fails.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    pub markup: Option<String>,
    pub image: Option<Vec<u8>>,
}

impl Diagnostics {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.markup.is_none() && self.image.is_none()
    }
}

/// Capability set of one chat surface.
///
/// Implementations own their session handle. Every method takes `&self` so a
/// single adapter can be shared by the ingest loop, the send loop and the
/// supervisor at the same time.
#[async_trait]
pub trait ChatAdapter: Send + Sync {
    fn service(&self) -> Service;

    /// Establish a session. [`Error::ConnectRejected`] is fatal; any other
    /// error is retried by the supervisor.
    async fn connect(&self, credentials: &Credentials) -> Result<()>;

    /// Tear down the current session, if any. Never fails.
    async fn disconnect(&self);

    fn is_connected(&self) -> bool;

    /// Deliver one already-split message.
    async fn send_message(
        &self,
        text: &str,
        author: Option<&str>,
        timestamp: Option<DateTime<Utc>>,
    ) -> Result<()>;

    fn outbound_profile(&self) -> OutboundProfile {
        OutboundProfile::default()
    }

    /// Number of messages this session has visibly sent. Only needed when
    /// [`OutboundProfile::confirm_delivery`] is set.
    async fn count_sent_messages(&self) -> Result<usize> {
        Err(Error::unavailable(format!(
            "{} does not count sent messages",
            self.service()
        )))
    }

    /// Return the first message after `cursor`.
    async fn poll_next_message(&self, cursor: i64) -> Result<PollOutcome>;

    /// Source-specific text rewrite applied once at ingestion.
    fn normalize(&self, text: &str) -> String {
        text.to_string()
    }

    async fn capture_markup(&self) -> Result<String> {
        Err(Error::unavailable(format!(
            "{} has no markup to capture",
            self.service()
        )))
    }

    /// PNG screenshot of the chat surface.
    async fn capture_screenshot(&self) -> Result<Vec<u8>> {
        Err(Error::unavailable(format!(
            "{} has no screen to capture",
            self.service()
        )))
    }

    /// Collect whatever markup and screenshot can be had. Fails only when
    /// nothing could be captured.
    async fn capture_diagnostics(&self) -> Result<Diagnostics> {
        let markup = self.capture_markup().await;
        let image = self.capture_screenshot().await;
        let diagnostics = Diagnostics {
            markup: markup.as_ref().ok().cloned(),
            image: image.as_ref().ok().cloned(),
        };
        if diagnostics.is_empty() {
            let reason = match (markup, image) {
                (Err(e), _) | (_, Err(e)) => e.to_string(),
                _ => "nothing captured".to_string(),
            };
            return Err(Error::capture(reason));
        }
        Ok(diagnostics)
    }

    /// Resolves when the adapter notices, on its own, that the current session
    /// died. The default never resolves.
    async fn next_fault(&self) -> String {
        std::future::pending().await
    }

    /// Final teardown; the adapter is not reused afterwards.
    async fn shutdown(&self) {
        self.disconnect().await;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    struct Inert;

    #[async_trait]
    impl ChatAdapter for Inert {
        fn service(&self) -> Service {
            Service::Discord
        }

        async fn connect(&self, _credentials: &Credentials) -> Result<()> {
            Ok(())
        }

        async fn disconnect(&self) {}

        fn is_connected(&self) -> bool {
            false
        }

        async fn send_message(
            &self,
            _text: &str,
            _author: Option<&str>,
            _timestamp: Option<DateTime<Utc>>,
        ) -> Result<()> {
            Ok(())
        }

        async fn poll_next_message(&self, cursor: i64) -> Result<PollOutcome> {
            Ok(PollOutcome::Idle { cursor })
        }
    }

    #[test]
    fn credentials_debug_is_redacted() {
        let creds = Credentials::Account {
            username: "zezima".into(),
            password: Secret::new("hunter2".into()),
        };
        let rendered = format!("{creds:?}");
        assert!(rendered.contains("zezima"));
        assert!(!rendered.contains("hunter2"));

        let token = Credentials::Token(Secret::new("abc.def".into()));
        assert!(!format!("{token:?}").contains("abc.def"));
    }

    #[tokio::test]
    async fn defaults_are_conservative() {
        let adapter = Inert;
        assert_eq!(adapter.outbound_profile(), OutboundProfile::default());
        assert_eq!(adapter.normalize("hi ❤"), "hi ❤");
        assert!(matches!(
            adapter.count_sent_messages().await,
            Err(Error::Unavailable { .. })
        ));
        assert!(matches!(
            adapter.capture_diagnostics().await,
            Err(Error::Capture { .. })
        ));
    }

    #[tokio::test]
    async fn default_fault_never_fires() {
        let adapter = Inert;
        let fired = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            adapter.next_fault(),
        )
        .await;
        assert!(fired.is_err());
    }
}
