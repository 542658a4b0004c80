use std::sync::{
    Arc, Mutex, OnceLock,
    atomic::{AtomicBool, AtomicU64, Ordering},
};

use {
    async_trait::async_trait,
    chatsync_channels::{ChatAdapter, Credentials, Error, PollOutcome, Result},
    chatsync_common::Service,
    chatsync_config::DiscordConfig,
    chrono::{DateTime, Utc},
    secrecy::ExposeSecret,
    serenity::{
        Client,
        all::{ChannelId, GatewayError, Http, ShardManager, UserId},
    },
    tokio::{
        sync::{mpsc, oneshot},
        task::JoinHandle,
    },
    tracing::{debug, info, warn},
};

use crate::{
    buffer::InboundBuffer,
    format::render,
    handler::DiscordHandler,
    normalize::normalize_emoji,
};

/// How a gateway session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
enum GatewayEnd {
    Rejected(String),
    Failed(String),
}

impl GatewayEnd {
    fn from_result(result: serenity::Result<()>) -> Self {
        match result {
            Ok(()) => Self::Failed("gateway session closed".into()),
            Err(serenity::Error::Gateway(
                e @ (GatewayError::InvalidAuthentication
                | GatewayError::InvalidGatewayIntents
                | GatewayError::DisallowedGatewayIntents),
            )) => Self::Rejected(e.to_string()),
            Err(e) => Self::Failed(e.to_string()),
        }
    }

    fn reason(&self) -> &str {
        match self {
            Self::Rejected(reason) | Self::Failed(reason) => reason,
        }
    }
}

struct Session {
    id: u64,
    http: Arc<Http>,
    shards: Arc<ShardManager>,
    task: JoinHandle<()>,
}

/// Chat platform side: one text channel through a bot session.
pub struct DiscordAdapter {
    config: DiscordConfig,
    buffer: Arc<InboundBuffer>,
    session: Mutex<Option<Session>>,
    next_session: AtomicU64,
    /// Id of the live session, 0 when none.
    current: Arc<AtomicU64>,
    live: Arc<AtomicBool>,
    faults_tx: mpsc::UnboundedSender<(u64, String)>,
    faults_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<(u64, String)>>,
}

impl DiscordAdapter {
    pub fn new(config: DiscordConfig) -> Self {
        let (faults_tx, faults_rx) = mpsc::unbounded_channel();
        Self {
            config,
            buffer: Arc::new(InboundBuffer::default()),
            session: Mutex::new(None),
            next_session: AtomicU64::new(0),
            current: Arc::new(AtomicU64::new(0)),
            live: Arc::new(AtomicBool::new(false)),
            faults_tx,
            faults_rx: tokio::sync::Mutex::new(faults_rx),
        }
    }

    fn http(&self) -> Option<Arc<Http>> {
        self.session
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|s| Arc::clone(&s.http))
    }

    async fn close_session(&self) {
        self.live.store(false, Ordering::SeqCst);
        self.current.store(0, Ordering::SeqCst);
        let session = self.session.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(session) = session {
            debug!(session = session.id, "closing discord session");
            session.shards.shutdown_all().await;
            session.task.abort();
        }
    }

    /// Forwards the end of a live session to [`ChatAdapter::next_fault`].
    fn watch_session_end(&self, id: u64, ended: oneshot::Receiver<GatewayEnd>) {
        let faults = self.faults_tx.clone();
        let current = Arc::clone(&self.current);
        let live = Arc::clone(&self.live);
        tokio::spawn(async move {
            let Ok(end) = ended.await else {
                return;
            };
            if current.load(Ordering::SeqCst) == id {
                live.store(false, Ordering::SeqCst);
                warn!(session = id, reason = end.reason(), "discord session ended");
                let _ = faults.send((id, end.reason().to_string()));
            }
        });
    }
}

#[async_trait]
impl ChatAdapter for DiscordAdapter {
    fn service(&self) -> Service {
        Service::Discord
    }

    async fn connect(&self, credentials: &Credentials) -> Result<()> {
        let Credentials::Token(token) = credentials else {
            return Err(Error::connect_rejected("Discord needs a bot token"));
        };
        let Some(channel_id) = self.config.channel_id() else {
            return Err(Error::connect_rejected(format!(
                "\"{}\" is not a valid channel id",
                self.config.channel_id
            )));
        };
        self.close_session().await;

        let id = self.next_session.fetch_add(1, Ordering::SeqCst) + 1;
        self.buffer.begin_session(id);

        let (ready_tx, ready_rx) = oneshot::channel();
        let bot_id = OnceLock::new();
        if let Some(configured) = self.config.bot_id() {
            let _ = bot_id.set(UserId::from(configured));
        }
        let handler = DiscordHandler {
            session: id,
            channel_id: ChannelId::from(channel_id),
            command_prefix: self.config.command_prefix.clone(),
            buffer: Arc::clone(&self.buffer),
            bot_id,
            ready: Mutex::new(Some(ready_tx)),
        };

        let mut client = Client::builder(token.expose_secret(), DiscordHandler::intents())
            .event_handler(handler)
            .await
            .map_err(|e| Error::connect_rejected(format!("invalid bot configuration: {e}")))?;

        let http = Arc::clone(&client.http);
        let shards = Arc::clone(&client.shard_manager);
        let (ended_tx, mut ended_rx) = oneshot::channel();
        let task = tokio::spawn(async move {
            let _ = ended_tx.send(GatewayEnd::from_result(client.start().await));
        });
        *self.session.lock().unwrap_or_else(|e| e.into_inner()) = Some(Session {
            id,
            http,
            shards,
            task,
        });

        let outcome = tokio::select! {
            ready = ready_rx => {
                ready.map_err(|_| Error::connect_failed("gateway closed before ready"))
            },
            end = &mut ended_rx => Err(match end {
                Ok(GatewayEnd::Rejected(reason)) => Error::connect_rejected(reason),
                Ok(GatewayEnd::Failed(reason)) => Error::connect_failed(reason),
                Err(_) => Error::connect_failed("gateway task aborted"),
            }),
            () = tokio::time::sleep(self.config.ready_timeout()) => {
                Err(Error::connect_failed("timed out waiting for the gateway"))
            },
        };

        match outcome {
            Ok(user) => {
                self.current.store(id, Ordering::SeqCst);
                self.live.store(true, Ordering::SeqCst);
                self.watch_session_end(id, ended_rx);
                info!(
                    session = id,
                    bot = %user,
                    channel = channel_id.get(),
                    "connected to discord"
                );
                Ok(())
            },
            Err(e) => {
                self.close_session().await;
                Err(e)
            },
        }
    }

    async fn disconnect(&self) {
        self.close_session().await;
    }

    fn is_connected(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    async fn send_message(
        &self,
        text: &str,
        author: Option<&str>,
        timestamp: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let http = self
            .http()
            .ok_or_else(|| Error::unavailable("no discord session"))?;
        let channel_id = self
            .config
            .channel_id()
            .ok_or_else(|| Error::unavailable("no discord channel"))?;
        ChannelId::from(channel_id)
            .say(&http, render(text, author, timestamp))
            .await
            .map(|_| ())
            .map_err(Error::send)
    }

    async fn poll_next_message(&self, cursor: i64) -> Result<PollOutcome> {
        Ok(self
            .buffer
            .next_after(cursor)
            .map_or(PollOutcome::Idle { cursor }, PollOutcome::Message))
    }

    fn normalize(&self, text: &str) -> String {
        normalize_emoji(text)
    }

    async fn next_fault(&self) -> String {
        let mut faults = self.faults_rx.lock().await;
        loop {
            let Some((id, reason)) = faults.recv().await else {
                return std::future::pending().await;
            };
            if id == self.current.load(Ordering::SeqCst) {
                return reason;
            }
            debug!(session = id, "dropping fault from an earlier session");
        }
    }

    async fn shutdown(&self) {
        self.close_session().await;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {super::*, chatsync_channels::InboundMessage, secrecy::Secret};

    fn config() -> DiscordConfig {
        DiscordConfig {
            channel_id: "123456789012345678".into(),
            ..DiscordConfig::default()
        }
    }

    #[test]
    fn gateway_rejections_are_fatal() {
        let end = GatewayEnd::from_result(Err(serenity::Error::Gateway(
            GatewayError::InvalidAuthentication,
        )));
        assert!(matches!(end, GatewayEnd::Rejected(_)));
        assert!(matches!(
            GatewayEnd::from_result(Ok(())),
            GatewayEnd::Failed(_)
        ));
    }

    #[tokio::test]
    async fn polls_buffered_messages() {
        let adapter = DiscordAdapter::new(config());
        adapter.buffer.begin_session(1);
        adapter.buffer.push(1, Some("alice".into()), "hey".into());

        assert_eq!(
            adapter.poll_next_message(-1).await.unwrap(),
            PollOutcome::Message(InboundMessage {
                index: 0,
                text: "hey".into(),
                author: Some("alice".into()),
            })
        );
        assert_eq!(
            adapter.poll_next_message(0).await.unwrap(),
            PollOutcome::Idle { cursor: 0 }
        );
    }

    #[tokio::test]
    async fn unbounded_unconfirmed_profile() {
        let adapter = DiscordAdapter::new(config());
        let profile = adapter.outbound_profile();
        assert_eq!(profile.max_len, None);
        assert!(!profile.confirm_delivery);
        assert_eq!(adapter.normalize("❤"), "<3");
    }

    #[tokio::test]
    async fn send_without_session_is_unavailable() {
        let adapter = DiscordAdapter::new(config());
        assert!(matches!(
            adapter.send_message("hi", None, None).await,
            Err(Error::Unavailable { .. })
        ));
    }

    #[tokio::test]
    async fn wrong_credentials_or_channel_are_rejected() {
        let adapter = DiscordAdapter::new(config());
        let err = adapter
            .connect(&Credentials::Account {
                username: "zezima".into(),
                password: Secret::new("hunter2".into()),
            })
            .await
            .unwrap_err();
        assert!(err.is_fatal());

        let adapter = DiscordAdapter::new(DiscordConfig {
            channel_id: "general".into(),
            ..DiscordConfig::default()
        });
        let err = adapter
            .connect(&Credentials::Token(Secret::new("abc".into())))
            .await
            .unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn zero_channel_id_is_rejected() {
        let adapter = DiscordAdapter::new(DiscordConfig {
            channel_id: "0".into(),
            ..DiscordConfig::default()
        });
        let err = adapter
            .connect(&Credentials::Token(Secret::new("abc.def.ghi".into())))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ConnectRejected { .. }));
        assert!(!adapter.is_connected());
    }

    #[tokio::test]
    async fn stale_faults_are_dropped() {
        let adapter = DiscordAdapter::new(config());
        adapter.current.store(2, Ordering::SeqCst);
        adapter.faults_tx.send((1, "old".into())).unwrap();
        adapter.faults_tx.send((2, "current".into())).unwrap();
        assert_eq!(adapter.next_fault().await, "current");
    }
}
