use std::{path::PathBuf, sync::Arc, time::Duration};

use {
    chatsync_channels::{ChatAdapter, CommandTable, Credentials},
    chatsync_common::Service,
    tracing::info,
};

use crate::{
    error::{Error, Result},
    pause::PauseFlags,
    queue::RelayQueue,
    router::CommandRouter,
    send::{SendLoop, SendSettings},
    supervisor::{
        ConnectionState, STABLE_SESSION, SessionStatus, Supervisor, SupervisorHandle,
        SupervisorSettings,
    },
};

/// One side of the bridge.
pub struct Endpoint {
    pub adapter: Arc<dyn ChatAdapter>,
    pub credentials: Credentials,
    /// Prefix that marks a command, e.g. `"!"`.
    pub command_prefix: String,
}

/// Timing knobs shared by both sides.
#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub idle_poll: Duration,
    pub confirm_timeout: Duration,
    pub confirm_poll: Duration,
    pub backoff_initial: Duration,
    pub backoff_max: Duration,
    pub error_dir: Option<PathBuf>,
}

impl Default for SyncSettings {
    fn default() -> Self {
        let send = SendSettings::default();
        Self {
            idle_poll: Duration::from_millis(600),
            confirm_timeout: send.confirm_timeout,
            confirm_poll: send.confirm_poll,
            backoff_initial: Duration::from_secs(1),
            backoff_max: Duration::from_secs(60),
            error_dir: None,
        }
    }
}

/// Everything owned on behalf of one service. The queues only keep weak
/// references to their drainers, so the lane holds the strong ones.
struct Lane {
    adapter: Arc<dyn ChatAdapter>,
    inbound: Arc<RelayQueue>,
    outbound: Arc<RelayQueue>,
    _sender: Arc<SendLoop>,
    _router: Arc<CommandRouter>,
    supervisor: SupervisorHandle,
}

/// The running bridge: two supervisors, four queues, two routers.
pub struct SyncCoordinator {
    runescape: Lane,
    discord: Lane,
    pause: Arc<PauseFlags>,
}

impl SyncCoordinator {
    /// Wire both sides together and start connecting. Must be called from
    /// within a tokio runtime.
    pub fn start(
        runescape: Endpoint,
        discord: Endpoint,
        scripts: CommandTable,
        settings: SyncSettings,
    ) -> Self {
        let scripts = Arc::new(scripts);
        let pause = Arc::new(PauseFlags::default());

        let rs_in = Arc::new(RelayQueue::new("runescape inbound"));
        let rs_out = Arc::new(RelayQueue::new("to runescape"));
        let dc_in = Arc::new(RelayQueue::new("discord inbound"));
        let dc_out = Arc::new(RelayQueue::new("to discord"));

        let rs_router = CommandRouter::new(
            Service::RuneScape,
            runescape.command_prefix.clone(),
            Arc::clone(&rs_in),
            Arc::clone(&rs_out),
            Arc::clone(&dc_out),
            Arc::clone(&scripts),
            Arc::clone(&pause),
        );
        let dc_router = CommandRouter::new(
            Service::Discord,
            discord.command_prefix.clone(),
            Arc::clone(&dc_in),
            Arc::clone(&dc_out),
            Arc::clone(&rs_out),
            Arc::clone(&scripts),
            Arc::clone(&pause),
        );

        let runescape = Self::lane(runescape, rs_in, rs_out, rs_router, &settings);
        let discord = Self::lane(discord, dc_in, dc_out, dc_router, &settings);
        info!("relay started");

        Self {
            runescape,
            discord,
            pause,
        }
    }

    fn lane(
        endpoint: Endpoint,
        inbound: Arc<RelayQueue>,
        outbound: Arc<RelayQueue>,
        router: Arc<CommandRouter>,
        settings: &SyncSettings,
    ) -> Lane {
        let supervisor = Supervisor::new(
            Arc::clone(&endpoint.adapter),
            endpoint.credentials,
            Arc::clone(&inbound),
            Arc::clone(&outbound),
            SupervisorSettings {
                idle_poll: settings.idle_poll,
                backoff_initial: settings.backoff_initial,
                backoff_max: settings.backoff_max,
                stable_after: STABLE_SESSION,
                error_dir: settings.error_dir.clone(),
            },
        );
        let sender = SendLoop::new(
            Arc::clone(&endpoint.adapter),
            Arc::clone(&outbound),
            supervisor.status(),
            SendSettings {
                confirm_timeout: settings.confirm_timeout,
                confirm_poll: settings.confirm_poll,
            },
        );
        Lane {
            adapter: endpoint.adapter,
            inbound,
            outbound,
            _sender: sender,
            _router: router,
            supervisor: supervisor.spawn(),
        }
    }

    fn lane_for(&self, service: Service) -> &Lane {
        match service {
            Service::RuneScape => &self.runescape,
            Service::Discord => &self.discord,
        }
    }

    fn lanes(&self, service: Option<Service>) -> Vec<&Lane> {
        match service {
            Some(service) => vec![self.lane_for(service)],
            None => vec![&self.runescape, &self.discord],
        }
    }

    /// Stop relaying towards `destination`, or in both directions.
    pub fn pause(&self, destination: Option<Service>) {
        for service in targets(destination) {
            if self.pause.pause(service) {
                info!(destination = %service, "relay paused");
            }
        }
    }

    pub fn resume(&self, destination: Option<Service>) {
        for service in targets(destination) {
            if self.pause.resume(service) {
                info!(destination = %service, "relay resumed");
            }
        }
    }

    pub fn is_paused(&self, destination: Service) -> bool {
        self.pause.is_paused(destination)
    }

    /// Tear down and reconnect one or both sessions, skipping any backoff.
    pub async fn restart(&self, service: Option<Service>) {
        for lane in self.lanes(service) {
            lane.supervisor.restart().await;
        }
    }

    /// Stop both supervisors and tear down their adapters.
    pub async fn shutdown(&self) {
        info!("shutting down relay");
        tokio::join!(
            self.runescape.supervisor.shutdown(),
            self.discord.supervisor.shutdown()
        );
    }

    pub fn state(&self, service: Service) -> ConnectionState {
        self.status(service).state()
    }

    pub fn status(&self, service: Service) -> SessionStatus {
        self.lane_for(service).supervisor.status()
    }

    /// Outbound queue feeding `service`.
    pub fn outbound(&self, service: Service) -> &Arc<RelayQueue> {
        &self.lane_for(service).outbound
    }

    /// Inbound queue fed by `service`.
    pub fn inbound(&self, service: Service) -> &Arc<RelayQueue> {
        &self.lane_for(service).inbound
    }

    pub async fn capture_markup(&self, service: Service) -> Result<String> {
        let lane = self.ready_lane(service)?;
        Ok(lane.adapter.capture_markup().await?)
    }

    pub async fn capture_screenshot(&self, service: Service) -> Result<Vec<u8>> {
        let lane = self.ready_lane(service)?;
        Ok(lane.adapter.capture_screenshot().await?)
    }

    fn ready_lane(&self, service: Service) -> Result<&Lane> {
        let lane = self.lane_for(service);
        if !lane.supervisor.status().is_connected() {
            return Err(Error::not_ready(service));
        }
        Ok(lane)
    }
}

fn targets(service: Option<Service>) -> Vec<Service> {
    service.map_or_else(|| Service::ALL.to_vec(), |s| vec![s])
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {
        super::*,
        crate::test_support::{MockAdapter, credentials, wait_until},
        chatsync_channels::OutboundProfile,
        chatsync_common::RelayMessage,
    };

    struct Bridge {
        game: Arc<MockAdapter>,
        chat: Arc<MockAdapter>,
        coordinator: SyncCoordinator,
    }

    fn settings() -> SyncSettings {
        SyncSettings {
            idle_poll: Duration::from_millis(3),
            confirm_timeout: Duration::from_millis(50),
            confirm_poll: Duration::from_millis(2),
            backoff_initial: Duration::from_millis(5),
            backoff_max: Duration::from_millis(20),
            error_dir: None,
        }
    }

    async fn bridge() -> Bridge {
        bridge_with(settings()).await
    }

    async fn bridge_with(settings: SyncSettings) -> Bridge {
        let game = MockAdapter::new(Service::RuneScape);
        game.set_profile(OutboundProfile {
            max_len: Some(80),
            confirm_delivery: true,
        });
        let chat = MockAdapter::new(Service::Discord);
        let coordinator = SyncCoordinator::start(
            Endpoint {
                adapter: game.clone(),
                credentials: credentials(),
                command_prefix: ".".into(),
            },
            Endpoint {
                adapter: chat.clone(),
                credentials: credentials(),
                command_prefix: "!".into(),
            },
            CommandTable::default(),
            settings,
        );
        for service in Service::ALL {
            let mut status = coordinator.status(service);
            status
                .wait_for(|s| s.state == ConnectionState::Connected)
                .await
                .unwrap();
        }
        Bridge {
            game,
            chat,
            coordinator,
        }
    }

    #[tokio::test]
    async fn relays_both_directions() {
        let b = bridge().await;
        b.chat.push_message("hi from discord", Some("alice"));
        b.game.push_message("hi from game", Some("Zezima"));

        wait_until(|| !b.game.sent().is_empty() && !b.chat.sent().is_empty()).await;
        assert_eq!(b.game.sent_lines(), ["alice: hi from discord"]);
        let chat = b.chat.sent();
        assert_eq!(chat[0].text, "hi from game");
        assert_eq!(chat[0].author.as_deref(), Some("Zezima"));
        assert!(chat[0].timestamp.is_some());
        b.coordinator.shutdown().await;
    }

    #[tokio::test]
    async fn help_answers_origin_only() {
        let b = bridge().await;
        b.chat.push_message("!help", Some("alice"));

        wait_until(|| b.chat.sent().len() == 1).await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(b.game.sent().is_empty());
        assert!(b.chat.sent()[0].text.contains("GNU AGPL-3.0"));
        b.coordinator.shutdown().await;
    }

    #[tokio::test]
    async fn paused_direction_drops_until_resumed() {
        let b = bridge().await;
        b.coordinator.pause(Some(Service::RuneScape));
        assert!(b.coordinator.is_paused(Service::RuneScape));
        assert!(!b.coordinator.is_paused(Service::Discord));

        b.chat.push_message("dropped", Some("alice"));
        wait_until(|| b.chat.polled_cursors().contains(&0)).await;
        wait_until(|| b.coordinator.inbound(Service::Discord).is_empty()).await;

        b.coordinator.resume(None);
        b.chat.push_message("relayed", Some("alice"));
        wait_until(|| !b.game.sent().is_empty()).await;
        assert_eq!(b.game.sent_lines(), ["alice: relayed"]);
        b.coordinator.shutdown().await;
    }

    #[tokio::test]
    async fn reconnect_clears_stale_backlog() {
        let b = bridge_with(SyncSettings {
            backoff_initial: Duration::from_millis(100),
            backoff_max: Duration::from_millis(100),
            ..settings()
        })
        .await;
        b.game.drop_session();
        let mut status = b.coordinator.status(Service::RuneScape);
        status
            .wait_for(|s| s.state != ConnectionState::Connected)
            .await
            .unwrap();

        b.coordinator
            .outbound(Service::RuneScape)
            .append(RelayMessage::text("stale"));
        status
            .wait_for(|s| s.state == ConnectionState::Connected && s.session == 2)
            .await
            .unwrap();

        assert!(b.coordinator.outbound(Service::RuneScape).is_empty());
        assert!(b.game.sent().is_empty());
        b.coordinator.shutdown().await;
    }

    #[tokio::test]
    async fn capture_requires_connected_session() {
        let b = bridge().await;
        b.game.set_markup("<html/>");
        assert_eq!(
            b.coordinator.capture_markup(Service::RuneScape).await.unwrap(),
            "<html/>"
        );

        b.coordinator.shutdown().await;
        assert!(matches!(
            b.coordinator.capture_markup(Service::RuneScape).await,
            Err(Error::NotReady { .. })
        ));
        assert!(b.game.was_shut_down());
        assert!(b.chat.was_shut_down());
    }

    #[tokio::test]
    async fn restart_reconnects_selected_service() {
        let b = bridge().await;
        b.coordinator.restart(Some(Service::Discord)).await;
        let mut status = b.coordinator.status(Service::Discord);
        status.wait_for(|s| s.session == 2).await.unwrap();
        assert_eq!(b.chat.connect_calls(), 2);
        assert_eq!(b.game.connect_calls(), 1);
        b.coordinator.shutdown().await;
    }
}
