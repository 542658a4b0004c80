use std::{
    collections::VecDeque,
    sync::{
        Mutex, MutexGuard, OnceLock, Weak,
        atomic::{AtomicU64, Ordering},
    },
};

use {
    chatsync_channels::MessageSink,
    chatsync_common::RelayMessage,
    tracing::{debug, trace},
};

/// Something that drains a queue when told there is work.
///
/// `schedule` must not block: it only requests a drain, which runs on the
/// tokio runtime. Requests made while a drain is active may be dropped.
pub trait DrainTrigger: Send + Sync {
    fn schedule(&self);
}

/// Unbounded FIFO of relay messages with a single drain trigger.
///
/// Elements leave only from the front. Each `append` schedules the trigger.
/// `clear` bumps an epoch so a drainer that peeked before the clear does not
/// pop an element that arrived after it.
pub struct RelayQueue {
    label: String,
    items: Mutex<VecDeque<RelayMessage>>,
    trigger: OnceLock<Weak<dyn DrainTrigger>>,
    epoch: AtomicU64,
}

impl RelayQueue {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            items: Mutex::new(VecDeque::new()),
            trigger: OnceLock::new(),
            epoch: AtomicU64::new(0),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Attach the drainer. Only the first call has any effect.
    pub fn set_trigger(&self, trigger: Weak<dyn DrainTrigger>) -> bool {
        self.trigger.set(trigger).is_ok()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<RelayMessage>> {
        self.items.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn append(&self, message: RelayMessage) {
        let len = {
            let mut items = self.lock();
            items.push_back(message);
            items.len()
        };
        trace!(queue = %self.label, len, "message queued");
        self.schedule();
    }

    /// Ask the drainer to run, e.g. after a reconnect.
    pub fn schedule(&self) {
        if let Some(trigger) = self.trigger.get().and_then(Weak::upgrade) {
            trigger.schedule();
        }
    }

    pub fn peek_front(&self) -> Option<RelayMessage> {
        self.lock().front().cloned()
    }

    /// Front element together with the epoch it was observed in.
    pub fn peek_front_tagged(&self) -> Option<(u64, RelayMessage)> {
        let items = self.lock();
        items
            .front()
            .map(|m| (self.epoch.load(Ordering::Acquire), m.clone()))
    }

    pub fn pop_front(&self) -> Option<RelayMessage> {
        self.lock().pop_front()
    }

    /// Pop the front element unless the queue was cleared since `epoch`.
    pub fn pop_front_tagged(&self, epoch: u64) -> Option<RelayMessage> {
        let mut items = self.lock();
        if self.epoch.load(Ordering::Acquire) != epoch {
            return None;
        }
        items.pop_front()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Drop everything without scheduling the drainer. Returns how many
    /// messages were discarded.
    pub fn clear(&self) -> usize {
        let mut items = self.lock();
        self.epoch.fetch_add(1, Ordering::AcqRel);
        let dropped = items.len();
        items.clear();
        if dropped > 0 {
            debug!(queue = %self.label, dropped, "queue cleared");
        }
        dropped
    }

    /// Cut the front element after `at` characters.
    ///
    /// The head keeps author and timestamp; the remainder keeps the author,
    /// loses the timestamp, and is inserted directly behind the head.
    /// Returns `false` when the front element already fits.
    pub fn split_front(&self, at: usize) -> bool {
        let mut items = self.lock();
        let Some(front) = items.front_mut() else {
            return false;
        };
        let Some((cut, _)) = front.text.char_indices().nth(at) else {
            return false;
        };
        let rest = front.text.split_off(cut);
        let remainder = RelayMessage {
            text: rest,
            author: front.author.clone(),
            timestamp: None,
        };
        items.insert(1, remainder);
        true
    }
}

impl MessageSink for RelayQueue {
    fn push(&self, message: RelayMessage) {
        self.append(message);
    }
}

impl std::fmt::Debug for RelayQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayQueue")
            .field("label", &self.label)
            .field("len", &self.len())
            .finish()
    }
}
