use std::{sync::Arc, time::Duration};

use {
    chatsync_channels::{CURSOR_START, ChatAdapter, Error, InboundMessage, PollOutcome},
    chatsync_common::RelayMessage,
    chrono::Utc,
    tokio::task::JoinHandle,
    tracing::{debug, info, trace},
};

use crate::{queue::RelayQueue, supervisor::SessionStatus};

/// How an ingest loop finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestEnd {
    /// The source reported the chat surface gone.
    Disconnected,
    /// The session it was started for is over.
    Stopped,
}

/// Polls one source for new messages during a single session.
pub struct IngestLoop {
    adapter: Arc<dyn ChatAdapter>,
    inbound: Arc<RelayQueue>,
    status: SessionStatus,
    idle_poll: Duration,
    session: u64,
}

impl IngestLoop {
    pub fn new(
        adapter: Arc<dyn ChatAdapter>,
        inbound: Arc<RelayQueue>,
        status: SessionStatus,
        idle_poll: Duration,
        session: u64,
    ) -> Self {
        Self {
            adapter,
            inbound,
            status,
            idle_poll,
            session,
        }
    }

    pub fn spawn(self) -> JoinHandle<IngestEnd> {
        tokio::spawn(self.run())
    }

    pub async fn run(self) -> IngestEnd {
        let service = self.adapter.service();
        let mut cursor = CURSOR_START;
        info!(%service, session = self.session, "ingest started");

        loop {
            if !self.status.is_current(self.session) {
                debug!(%service, session = self.session, "ingest stopped");
                return IngestEnd::Stopped;
            }

            match self.adapter.poll_next_message(cursor).await {
                Ok(PollOutcome::Message(message)) => {
                    cursor = message.index;
                    self.enqueue(message);
                    tokio::task::yield_now().await;
                },
                Ok(PollOutcome::Idle { cursor: corrected }) => {
                    if corrected != cursor {
                        debug!(%service, from = cursor, to = corrected, "cursor corrected");
                    }
                    cursor = corrected;
                    tokio::time::sleep(self.idle_poll).await;
                },
                Ok(PollOutcome::Disconnected) | Err(Error::Disconnected { .. }) => {
                    info!(%service, session = self.session, "source disconnected");
                    return IngestEnd::Disconnected;
                },
                Err(e) => {
                    debug!(%service, error = %e, "poll failed, treating as idle");
                    tokio::time::sleep(self.idle_poll).await;
                },
            }
        }
    }

    /// Normalize, split into lines and queue. All lines share one timestamp.
    fn enqueue(&self, message: InboundMessage) {
        let timestamp = Utc::now();
        let text = self.adapter.normalize(&message.text);
        for line in text.split('\n') {
            let line = line.strip_suffix('\r').unwrap_or(line);
            // The game chat cannot submit a blank line.
            if line.trim().is_empty() {
                continue;
            }
            trace!(service = %self.adapter.service(), index = message.index, "message ingested");
            self.inbound.append(RelayMessage {
                text: line.to_string(),
                author: message.author.clone(),
                timestamp: Some(timestamp),
            });
        }
    }
}
