//! Scripted in-memory adapter for engine tests.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::{
    collections::VecDeque,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use {
    async_trait::async_trait,
    chatsync_channels::{
        ChatAdapter, Credentials, Error, InboundMessage, OutboundProfile, PollOutcome, Result,
    },
    chatsync_common::Service,
    chrono::{DateTime, Utc},
    secrecy::Secret,
    tokio::sync::mpsc,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Sent {
    pub text: String,
    pub author: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl Sent {
    /// `"author: text"`, the way a game chat line reads.
    pub fn line(&self) -> String {
        match &self.author {
            Some(author) => format!("{author}: {}", self.text),
            None => self.text.clone(),
        }
    }
}

type Normalizer = Box<dyn Fn(&str) -> String + Send + Sync>;

pub(crate) struct MockAdapter {
    service: Service,
    profile: Mutex<OutboundProfile>,
    live: AtomicBool,
    history: Mutex<Vec<(String, Option<String>)>>,
    cursors: Mutex<Vec<i64>>,
    failing_polls: AtomicUsize,
    connect_results: Mutex<VecDeque<Result<()>>>,
    connect_calls: AtomicUsize,
    shut_down: AtomicBool,
    sent: Mutex<Vec<Sent>>,
    delivered: AtomicUsize,
    swallowed_sends: AtomicUsize,
    failing_sends: AtomicUsize,
    markup: Mutex<Option<String>>,
    capture_calls: AtomicUsize,
    normalizer: Mutex<Option<Normalizer>>,
    faults_tx: mpsc::UnboundedSender<String>,
    faults_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<String>>,
}

impl MockAdapter {
    pub fn new(service: Service) -> Arc<Self> {
        let (faults_tx, faults_rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            service,
            profile: Mutex::new(OutboundProfile::default()),
            live: AtomicBool::new(true),
            history: Mutex::new(Vec::new()),
            cursors: Mutex::new(Vec::new()),
            failing_polls: AtomicUsize::new(0),
            connect_results: Mutex::new(VecDeque::new()),
            connect_calls: AtomicUsize::new(0),
            shut_down: AtomicBool::new(false),
            sent: Mutex::new(Vec::new()),
            delivered: AtomicUsize::new(0),
            swallowed_sends: AtomicUsize::new(0),
            failing_sends: AtomicUsize::new(0),
            markup: Mutex::new(None),
            capture_calls: AtomicUsize::new(0),
            normalizer: Mutex::new(None),
            faults_tx,
            faults_rx: tokio::sync::Mutex::new(faults_rx),
        })
    }

    pub fn set_profile(&self, profile: OutboundProfile) {
        *self.profile.lock().unwrap() = profile;
    }

    pub fn set_normalizer(&self, f: impl Fn(&str) -> String + Send + Sync + 'static) {
        *self.normalizer.lock().unwrap() = Some(Box::new(f));
    }

    pub fn set_markup(&self, markup: &str) {
        *self.markup.lock().unwrap() = Some(markup.to_string());
    }

    /// Queue the result of the next `connect` call. Unscripted calls succeed.
    pub fn push_connect_result(&self, result: Result<()>) {
        self.connect_results.lock().unwrap().push_back(result);
    }

    /// Make a message appear on the source side.
    pub fn push_message(&self, text: &str, author: Option<&str>) {
        self.history
            .lock()
            .unwrap()
            .push((text.to_string(), author.map(str::to_string)));
    }

    /// Keep only the first `len` messages, as if the surface trimmed its list.
    pub fn shrink_history(&self, len: usize) {
        self.history.lock().unwrap().truncate(len);
    }

    pub fn fail_next_polls(&self, n: usize) {
        self.failing_polls.store(n, Ordering::SeqCst);
    }

    /// The next `n` sends report success but never show up in the counter.
    pub fn swallow_next_sends(&self, n: usize) {
        self.swallowed_sends.store(n, Ordering::SeqCst);
    }

    pub fn fail_next_sends(&self, n: usize) {
        self.failing_sends.store(n, Ordering::SeqCst);
    }

    /// Kill the session from the source side: polls report `Disconnected`.
    pub fn drop_session(&self) {
        self.live.store(false, Ordering::SeqCst);
    }

    pub fn fire_fault(&self, reason: &str) {
        self.faults_tx.send(reason.to_string()).unwrap();
    }

    pub fn polled_cursors(&self) -> Vec<i64> {
        self.cursors.lock().unwrap().clone()
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_lines(&self) -> Vec<String> {
        self.sent().iter().map(Sent::line).collect()
    }

    pub fn connect_calls(&self) -> usize {
        self.connect_calls.load(Ordering::SeqCst)
    }

    pub fn capture_calls(&self) -> usize {
        self.capture_calls.load(Ordering::SeqCst)
    }

    pub fn was_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }
}

fn take_one(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

#[async_trait]
impl ChatAdapter for MockAdapter {
    fn service(&self) -> Service {
        self.service
    }

    async fn connect(&self, _credentials: &Credentials) -> Result<()> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self.connect_results.lock().unwrap().pop_front();
        let result = scripted.unwrap_or(Ok(()));
        if result.is_ok() {
            self.history.lock().unwrap().clear();
            self.live.store(true, Ordering::SeqCst);
        }
        result
    }

    async fn disconnect(&self) {
        self.live.store(false, Ordering::SeqCst);
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
        if take_one(&self.failing_sends) {
            return Err(Error::send("scripted failure"));
        }
        self.sent.lock().unwrap().push(Sent {
            text: text.to_string(),
            author: author.map(str::to_string),
            timestamp,
        });
        if !take_one(&self.swallowed_sends) {
            self.delivered.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    fn outbound_profile(&self) -> OutboundProfile {
        *self.profile.lock().unwrap()
    }

    async fn count_sent_messages(&self) -> Result<usize> {
        Ok(self.delivered.load(Ordering::SeqCst))
    }

    async fn poll_next_message(&self, cursor: i64) -> Result<PollOutcome> {
        self.cursors.lock().unwrap().push(cursor);
        if !self.live.load(Ordering::SeqCst) {
            return Ok(PollOutcome::Disconnected);
        }
        if take_one(&self.failing_polls) {
            return Err(Error::transient_read("scripted failure"));
        }
        let history = self.history.lock().unwrap();
        let len = history.len() as i64;
        let next = cursor + 1;
        if next < len {
            let (text, author) = history[next as usize].clone();
            return Ok(PollOutcome::Message(InboundMessage {
                index: next,
                text,
                author,
            }));
        }
        Ok(PollOutcome::Idle {
            cursor: cursor.min(len - 1),
        })
    }

    fn normalize(&self, text: &str) -> String {
        match &*self.normalizer.lock().unwrap() {
            Some(f) => f(text),
            None => text.to_string(),
        }
    }

    async fn capture_markup(&self) -> Result<String> {
        self.capture_calls.fetch_add(1, Ordering::SeqCst);
        self.markup
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| Error::unavailable("no markup"))
    }

    async fn next_fault(&self) -> String {
        self.faults_rx.lock().await.recv().await.unwrap_or_default()
    }

    async fn shutdown(&self) {
        self.shut_down.store(true, Ordering::SeqCst);
        self.live.store(false, Ordering::SeqCst);
    }
}

pub(crate) fn credentials() -> Credentials {
    Credentials::Token(Secret::new("test-token".into()))
}

/// Poll `cond` until it holds, failing the test after two seconds.
pub(crate) async fn wait_until(cond: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !cond() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached in time"
        );
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
}
