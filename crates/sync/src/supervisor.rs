use std::{fmt, path::PathBuf, sync::Arc, time::Duration};

use {
    chatsync_channels::{ChatAdapter, Credentials},
    chatsync_common::Service,
    chrono::Utc,
    tokio::{
        sync::{Mutex, mpsc, watch},
        task::JoinHandle,
        time::Instant,
    },
    tracing::{debug, error, info, warn},
};

use crate::{
    dump,
    ingest::{IngestEnd, IngestLoop},
    queue::RelayQueue,
};

/// Lifecycle of one adapter session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Errored,
    ShuttingDown,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Errored => "errored",
            Self::ShuttingDown => "shutting down",
        })
    }
}

/// Current state plus the number of the session it belongs to. The session
/// number increases every time the supervisor reaches `Connected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionState {
    pub state: ConnectionState,
    pub session: u64,
}

/// Read side of a supervisor's state.
#[derive(Debug, Clone)]
pub struct SessionStatus(watch::Receiver<SessionState>);

impl SessionStatus {
    pub(crate) fn from_receiver(rx: watch::Receiver<SessionState>) -> Self {
        Self(rx)
    }

    pub fn current(&self) -> SessionState {
        *self.0.borrow()
    }

    pub fn state(&self) -> ConnectionState {
        self.current().state
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Still connected within `session`.
    pub fn is_current(&self, session: u64) -> bool {
        let now = self.current();
        now.state == ConnectionState::Connected && now.session == session
    }

    /// Wait until `pred` holds. Returns the matching state, or `None` if the
    /// supervisor is gone.
    pub async fn wait_for(
        &mut self,
        mut pred: impl FnMut(&SessionState) -> bool,
    ) -> Option<SessionState> {
        self.0.wait_for(|s| pred(s)).await.ok().map(|s| *s)
    }
}

/// Bounded exponential delay between automatic reconnects.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    next: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            next: initial,
        }
    }

    pub fn next_delay(&mut self) -> Duration {
        let delay = self.next.min(self.max);
        self.next = self.next.saturating_mul(2).min(self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.next = self.initial;
    }
}

#[derive(Debug, Clone)]
pub struct SupervisorSettings {
    pub idle_poll: Duration,
    pub backoff_initial: Duration,
    pub backoff_max: Duration,
    /// A session that faults sooner than this after connecting counts
    /// towards the fault streak.
    pub stable_after: Duration,
    /// Where failure diagnostics go. `None` disables capture.
    pub error_dir: Option<PathBuf>,
}

/// Default for [`SupervisorSettings::stable_after`].
pub const STABLE_SESSION: Duration = Duration::from_secs(30);

#[derive(Debug)]
enum Command {
    Restart,
    Shutdown,
}

/// Why a connected session ended.
enum SessionEnd {
    Lost(IngestEnd),
    Fault(String),
    Command(Command),
}

/// What to do after a failure has been handled.
enum Next {
    Connect,
    Park,
    Shutdown,
}

/// Owns one adapter's session lifecycle: connect, watch, recover.
pub struct Supervisor {
    adapter: Arc<dyn ChatAdapter>,
    credentials: Credentials,
    inbound: Arc<RelayQueue>,
    outbound: Arc<RelayQueue>,
    settings: SupervisorSettings,
    state_tx: watch::Sender<SessionState>,
    commands_tx: mpsc::Sender<Command>,
    commands: mpsc::Receiver<Command>,
    session: u64,
    /// Adapter faults in a row from sessions that never became stable.
    fault_streak: u32,
    fault_backoff: Backoff,
}

impl Supervisor {
    pub fn new(
        adapter: Arc<dyn ChatAdapter>,
        credentials: Credentials,
        inbound: Arc<RelayQueue>,
        outbound: Arc<RelayQueue>,
        settings: SupervisorSettings,
    ) -> Self {
        let (state_tx, _) = watch::channel(SessionState {
            state: ConnectionState::Disconnected,
            session: 0,
        });
        let (commands_tx, commands) = mpsc::channel(8);
        let fault_backoff = Backoff::new(settings.backoff_initial, settings.backoff_max);
        Self {
            adapter,
            credentials,
            inbound,
            outbound,
            settings,
            state_tx,
            commands_tx,
            commands,
            session: 0,
            fault_streak: 0,
            fault_backoff,
        }
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus::from_receiver(self.state_tx.subscribe())
    }

    /// Start connecting in the background.
    pub fn spawn(self) -> SupervisorHandle {
        let service = self.adapter.service();
        let status = self.status();
        let commands = self.commands_tx.clone();
        let task = tokio::spawn(self.run());
        SupervisorHandle {
            service,
            status,
            commands,
            task: Mutex::new(Some(task)),
        }
    }

    fn service(&self) -> Service {
        self.adapter.service()
    }

    fn set_state(&self, state: ConnectionState) {
        let session = self.session;
        self.state_tx.send_replace(SessionState { state, session });
        debug!(service = %self.service(), session, %state, "session state changed");
    }

    async fn run(mut self) {
        let mut backoff = Backoff::new(self.settings.backoff_initial, self.settings.backoff_max);
        let mut next = Next::Connect;
        loop {
            next = match next {
                Next::Connect => self.connect_and_watch(&mut backoff).await,
                Next::Park => match self.commands.recv().await {
                    Some(Command::Restart) => {
                        info!(service = %self.service(), "restart requested");
                        Next::Connect
                    },
                    Some(Command::Shutdown) | None => Next::Shutdown,
                },
                Next::Shutdown => break,
            };
        }

        self.set_state(ConnectionState::ShuttingDown);
        self.adapter.shutdown().await;
        info!(service = %self.service(), "supervisor stopped");
    }

    /// One pass through `Connecting` and, on success, `Connected`.
    async fn connect_and_watch(&mut self, backoff: &mut Backoff) -> Next {
        self.set_state(ConnectionState::Connecting);
        info!(service = %self.service(), "connecting");

        let adapter = Arc::clone(&self.adapter);
        let attempt = tokio::select! {
            result = adapter.connect(&self.credentials) => result,
            command = self.commands.recv() => {
                adapter.disconnect().await;
                return self.after_command(command);
            },
        };

        if let Err(e) = attempt {
            if e.is_fatal() {
                error!(
                    service = %self.service(),
                    error = %e,
                    "connection rejected, waiting for operator restart"
                );
                adapter.disconnect().await;
                self.set_state(ConnectionState::Disconnected);
                return Next::Park;
            }
            warn!(service = %self.service(), error = %e, "connection attempt failed");
            self.set_state(ConnectionState::Errored);
            self.capture_diagnostics().await;
            adapter.disconnect().await;
            return self.wait_before_retry(backoff.next_delay()).await;
        }

        self.session += 1;
        let dropped = self.outbound.clear();
        self.set_state(ConnectionState::Connected);
        backoff.reset();
        let connected_at = Instant::now();
        info!(
            service = %self.service(),
            session = self.session,
            dropped_backlog = dropped,
            "connected"
        );

        let mut ingest = IngestLoop::new(
            Arc::clone(&self.adapter),
            Arc::clone(&self.inbound),
            self.status(),
            self.settings.idle_poll,
            self.session,
        )
        .spawn();
        self.outbound.schedule();

        let end = tokio::select! {
            joined = &mut ingest => {
                SessionEnd::Lost(joined.unwrap_or(IngestEnd::Disconnected))
            },
            reason = adapter.next_fault() => SessionEnd::Fault(reason),
            command = self.commands.recv() => {
                SessionEnd::Command(command.unwrap_or(Command::Shutdown))
            },
        };

        match end {
            SessionEnd::Lost(how) => {
                error!(service = %self.service(), session = self.session, ?how, "session lost");
                self.set_state(ConnectionState::Errored);
                self.capture_diagnostics().await;
                adapter.disconnect().await;
                self.clear_fault_streak();
                self.wait_before_retry(backoff.next_delay()).await
            },
            SessionEnd::Fault(reason) => {
                if connected_at.elapsed() >= self.settings.stable_after {
                    self.clear_fault_streak();
                }
                self.fault_streak += 1;
                warn!(
                    service = %self.service(),
                    session = self.session,
                    streak = self.fault_streak,
                    %reason,
                    "adapter fault, reconnecting"
                );
                self.set_state(ConnectionState::Disconnected);
                Self::stop_ingest(ingest).await;
                adapter.disconnect().await;
                if self.fault_streak == 1 {
                    Next::Connect
                } else {
                    let delay = self.fault_backoff.next_delay();
                    self.wait_before_retry(delay).await
                }
            },
            SessionEnd::Command(command) => {
                self.clear_fault_streak();
                self.set_state(ConnectionState::Disconnected);
                Self::stop_ingest(ingest).await;
                adapter.disconnect().await;
                self.after_command(Some(command))
            },
        }
    }

    fn after_command(&self, command: Option<Command>) -> Next {
        match command {
            Some(Command::Restart) => {
                info!(service = %self.service(), "restart requested");
                self.set_state(ConnectionState::Disconnected);
                Next::Connect
            },
            Some(Command::Shutdown) | None => Next::Shutdown,
        }
    }

    fn clear_fault_streak(&mut self) {
        self.fault_streak = 0;
        self.fault_backoff.reset();
    }

    /// Sit in `Disconnected` for `delay`. Operator commands cut the wait
    /// short.
    async fn wait_before_retry(&mut self, delay: Duration) -> Next {
        self.set_state(ConnectionState::Disconnected);
        if delay.is_zero() {
            return Next::Connect;
        }
        info!(
            service = %self.service(),
            delay_ms = delay.as_millis() as u64,
            "reconnecting after delay"
        );
        tokio::select! {
            () = tokio::time::sleep(delay) => Next::Connect,
            command = self.commands.recv() => self.after_command(command),
        }
    }

    /// Let the ingest loop notice the state change and exit on its own.
    async fn stop_ingest(ingest: JoinHandle<IngestEnd>) {
        if let Err(e) = ingest.await {
            debug!(error = %e, "ingest task ended abnormally");
        }
    }

    async fn capture_diagnostics(&self) {
        let Some(dir) = &self.settings.error_dir else {
            return;
        };
        match self.adapter.capture_diagnostics().await {
            Ok(diagnostics) => {
                if let Err(e) = dump::write_diagnostics(dir, Utc::now(), &diagnostics).await {
                    warn!(service = %self.service(), error = %e, "failed to write diagnostics");
                }
            },
            Err(e) => {
                warn!(service = %self.service(), error = %e, "diagnostic capture failed");
            },
        }
    }
}

/// Control side of a running supervisor.
pub struct SupervisorHandle {
    service: Service,
    status: SessionStatus,
    commands: mpsc::Sender<Command>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SupervisorHandle {
    pub fn service(&self) -> Service {
        self.service
    }

    pub fn status(&self) -> SessionStatus {
        self.status.clone()
    }

    /// Tear down the current session and connect again right away.
    pub async fn restart(&self) -> bool {
        self.commands.send(Command::Restart).await.is_ok()
    }

    /// Stop the supervisor and wait for the adapter to be torn down.
    pub async fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown).await;
        let task = self.task.lock().await.take();
        if let Some(task) = task
            && let Err(e) = task.await
        {
            warn!(service = %self.service, error = %e, "supervisor task failed");
        }
    }
}
