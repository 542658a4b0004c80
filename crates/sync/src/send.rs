use std::{
    sync::{Arc, Weak},
    time::Duration,
};

use {
    async_trait::async_trait,
    chatsync_channels::{ChatAdapter, OutboundProfile},
    chatsync_common::RelayMessage,
    tokio::time::Instant,
    tracing::{debug, error, trace, warn},
};

use crate::{
    drain::{Drain, SingleFlight, schedule_drain},
    queue::{DrainTrigger, RelayQueue},
    supervisor::SessionStatus,
};

/// `": "` between author and text in a length-limited rendering.
const AUTHOR_SEPARATOR_LEN: usize = 2;

#[derive(Debug, Clone, Copy)]
pub struct SendSettings {
    /// How long a confirmed send waits for the sent counter to move.
    pub confirm_timeout: Duration,
    /// Interval between counter checks while confirming.
    pub confirm_poll: Duration,
}

impl Default for SendSettings {
    fn default() -> Self {
        Self {
            confirm_timeout: Duration::from_millis(2000),
            confirm_poll: Duration::from_millis(50),
        }
    }
}

/// Result of one confirmed send attempt.
enum Delivery {
    Confirmed,
    Unconfirmed,
    Offline,
}

/// Drains one outbound queue into its destination adapter.
pub struct SendLoop {
    me: Weak<SendLoop>,
    adapter: Arc<dyn ChatAdapter>,
    queue: Arc<RelayQueue>,
    status: SessionStatus,
    settings: SendSettings,
    flight: SingleFlight,
}

impl SendLoop {
    /// Build the loop and register it as the queue's drain trigger.
    pub fn new(
        adapter: Arc<dyn ChatAdapter>,
        queue: Arc<RelayQueue>,
        status: SessionStatus,
        settings: SendSettings,
    ) -> Arc<Self> {
        let send_loop = Arc::new_cyclic(|me| Self {
            me: me.clone(),
            adapter,
            queue,
            status,
            settings,
            flight: SingleFlight::default(),
        });
        let trigger: Weak<dyn DrainTrigger> = Arc::<Self>::downgrade(&send_loop);
        if !send_loop.queue.set_trigger(trigger) {
            warn!(queue = %send_loop.queue.label(), "queue already has a drainer");
        }
        send_loop
    }

    /// Author to render in front of the text, if it leaves room for any text.
    fn effective_author<'a>(message: &'a RelayMessage, max_len: Option<usize>) -> Option<&'a str> {
        let author = message.author.as_deref()?;
        match max_len {
            Some(limit) if author.chars().count() + AUTHOR_SEPARATOR_LEN >= limit => None,
            _ => Some(author),
        }
    }

    /// Characters of text that fit next to `author` under `limit`.
    fn text_budget(author: Option<&str>, limit: usize) -> usize {
        let prefix = author.map_or(0, |a| a.chars().count() + AUTHOR_SEPARATOR_LEN);
        limit.saturating_sub(prefix).max(1)
    }

    async fn deliver_confirmed(&self, message: &RelayMessage, author: Option<&str>) -> Delivery {
        let before = match self.adapter.count_sent_messages().await {
            Ok(n) => n,
            Err(e) => {
                debug!(service = %self.adapter.service(), error = %e, "cannot read sent counter");
                tokio::time::sleep(self.settings.confirm_poll).await;
                return Delivery::Unconfirmed;
            },
        };

        if let Err(e) = self
            .adapter
            .send_message(&message.text, author, message.timestamp)
            .await
        {
            warn!(service = %self.adapter.service(), error = %e, "send failed, will retry");
            tokio::time::sleep(self.settings.confirm_poll).await;
            return Delivery::Unconfirmed;
        }

        let deadline = Instant::now() + self.settings.confirm_timeout;
        loop {
            tokio::time::sleep(self.settings.confirm_poll).await;
            match self.adapter.count_sent_messages().await {
                Ok(now) if now > before => return Delivery::Confirmed,
                Ok(_) => {},
                Err(e) => trace!(error = %e, "sent counter unavailable"),
            }
            if !self.status.is_connected() {
                return Delivery::Offline;
            }
            if Instant::now() >= deadline {
                return Delivery::Unconfirmed;
            }
        }
    }
}

impl DrainTrigger for SendLoop {
    fn schedule(&self) {
        if let Some(this) = self.me.upgrade() {
            schedule_drain(this);
        }
    }
}

#[async_trait]
impl Drain for SendLoop {
    fn flight(&self) -> &SingleFlight {
        &self.flight
    }

    fn has_work(&self) -> bool {
        self.status.is_connected() && !self.queue.is_empty()
    }

    async fn drain(&self) {
        let service = self.adapter.service();
        let OutboundProfile {
            max_len,
            confirm_delivery,
        } = self.adapter.outbound_profile();

        loop {
            if !self.status.is_connected() {
                debug!(%service, pending = self.queue.len(), "destination offline, send loop idle");
                return;
            }
            let Some((epoch, message)) = self.queue.peek_front_tagged() else {
                return;
            };

            let author = Self::effective_author(&message, max_len);
            if let Some(limit) = max_len {
                let budget = Self::text_budget(author, limit);
                if message.char_len() > budget && self.queue.split_front(budget) {
                    trace!(%service, budget, "message split to fit");
                    continue;
                }
            }

            if !confirm_delivery {
                if let Err(e) = self
                    .adapter
                    .send_message(&message.text, author, message.timestamp)
                    .await
                {
                    error!(%service, error = %e, "send failed, dropping message");
                }
                self.queue.pop_front_tagged(epoch);
                continue;
            }

            match self.deliver_confirmed(&message, author).await {
                Delivery::Confirmed => {
                    self.queue.pop_front_tagged(epoch);
                },
                Delivery::Unconfirmed => {
                    debug!(%service, "send not confirmed, retrying");
                },
                Delivery::Offline => return,
            }
        }
    }
}
