use std::sync::{Arc, Weak};

use {
    async_trait::async_trait,
    chatsync_channels::{CommandTable, MessageSink, ScriptContext, ScriptInvocation, invoke_script},
    chatsync_common::{RelayMessage, Service},
    tracing::{debug, trace, warn},
};

use crate::{
    drain::{Drain, SingleFlight, schedule_drain},
    pause::PauseFlags,
    queue::{DrainTrigger, RelayQueue},
};

const APP_NAME: &str = "chatsync";
const PROJECT_URL: &str = env!("CARGO_PKG_REPOSITORY");

/// Commands every source answers without any plugin registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Help,
    Info,
    License,
    Source,
}

impl Builtin {
    pub fn parse(command: &str) -> Option<Self> {
        match command {
            "help" => Some(Self::Help),
            "info" => Some(Self::Info),
            "license" => Some(Self::License),
            "source" => Some(Self::Source),
            _ => None,
        }
    }
}

/// The informational reply, shaped for the service it is sent back to.
pub fn canned_reply(destination: Service) -> Vec<RelayMessage> {
    let licensed = format!("{APP_NAME} is free software licensed under the GNU AGPL-3.0");
    match destination {
        Service::RuneScape => vec![
            RelayMessage::text(licensed),
            RelayMessage::text("Help, source code, and full license info can be found on GitHub"),
        ],
        Service::Discord => vec![RelayMessage::text(format!(
            "{licensed}\nHelp, source code, and full license info: {PROJECT_URL}"
        ))],
    }
}

/// Prefix-stripped, lowercased first token of `text`, if it is a command.
pub fn parse_command(prefix: &str, text: &str) -> Option<String> {
    let token = text.split_whitespace().next()?;
    let name = token.strip_prefix(prefix)?;
    if name.is_empty() {
        return None;
    }
    Some(name.to_lowercase())
}

/// What happened to one inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routed {
    Builtin(Builtin),
    Forwarded,
    Paused,
}

/// Drains a source's inbound queue: answers built-in commands, runs plugin
/// scripts and forwards everything else to the opposite service.
pub struct CommandRouter {
    me: Weak<CommandRouter>,
    origin: Service,
    prefix: String,
    inbound: Arc<RelayQueue>,
    reply: Arc<RelayQueue>,
    relay: Arc<RelayQueue>,
    scripts: Arc<CommandTable>,
    pause: Arc<PauseFlags>,
    flight: SingleFlight,
}

impl CommandRouter {
    /// `reply` is the outbound queue back to `origin`; `relay` the one to the
    /// opposite service. The router registers itself as `inbound`'s drainer.
    pub fn new(
        origin: Service,
        prefix: impl Into<String>,
        inbound: Arc<RelayQueue>,
        reply: Arc<RelayQueue>,
        relay: Arc<RelayQueue>,
        scripts: Arc<CommandTable>,
        pause: Arc<PauseFlags>,
    ) -> Arc<Self> {
        let router = Arc::new_cyclic(|me| Self {
            me: me.clone(),
            origin,
            prefix: prefix.into(),
            inbound,
            reply,
            relay,
            scripts,
            pause,
            flight: SingleFlight::default(),
        });
        let trigger: Weak<dyn DrainTrigger> = Arc::<Self>::downgrade(&router);
        if !router.inbound.set_trigger(trigger) {
            warn!(queue = %router.inbound.label(), "queue already has a drainer");
        }
        router
    }

    pub async fn route(&self, message: RelayMessage) -> Routed {
        if let Some(command) = parse_command(&self.prefix, &message.text) {
            if let Some(builtin) = Builtin::parse(&command) {
                debug!(origin = %self.origin, ?builtin, "built-in command");
                for reply in canned_reply(self.origin) {
                    self.reply.append(reply);
                }
                return Routed::Builtin(builtin);
            }
            self.run_scripts(&message, command).await;
        }

        let destination = self.origin.opposite();
        if self.pause.is_paused(destination) {
            trace!(origin = %self.origin, %destination, "relay paused, message dropped");
            return Routed::Paused;
        }
        self.relay.append(message);
        Routed::Forwarded
    }

    async fn run_scripts(&self, message: &RelayMessage, command: String) {
        let handlers = self.scripts.handlers(self.origin, &command);
        if handlers.is_empty() {
            return;
        }
        let reply: Arc<dyn MessageSink> = self.reply.clone();
        let relay: Arc<dyn MessageSink> = self.relay.clone();
        let ctx = ScriptContext::new(self.origin, reply, relay);
        let invocation = ScriptInvocation {
            text: message.text.clone(),
            author: message.author.clone(),
            command,
            tokens: message.text.split_whitespace().map(str::to_string).collect(),
        };
        for script in handlers {
            debug!(
                origin = %self.origin,
                script = script.name(),
                command = %invocation.command,
                "running script"
            );
            if let Err(e) = invoke_script(script.as_ref(), &ctx, &invocation).await {
                warn!(
                    origin = %self.origin,
                    script = script.name(),
                    error = %e,
                    "script failed"
                );
            }
        }
    }
}

impl DrainTrigger for CommandRouter {
    fn schedule(&self) {
        if let Some(this) = self.me.upgrade() {
            schedule_drain(this);
        }
    }
}

#[async_trait]
impl Drain for CommandRouter {
    fn flight(&self) -> &SingleFlight {
        &self.flight
    }

    fn has_work(&self) -> bool {
        !self.inbound.is_empty()
    }

    async fn drain(&self) {
        while let Some((epoch, message)) = self.inbound.peek_front_tagged() {
            self.route(message).await;
            self.inbound.pop_front_tagged(epoch);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {
        super::*,
        crate::test_support::wait_until,
        chatsync_channels::ChatScript,
        rstest::rstest,
        std::sync::Mutex,
    };

    struct Rig {
        router: Arc<CommandRouter>,
        inbound: Arc<RelayQueue>,
        reply: Arc<RelayQueue>,
        relay: Arc<RelayQueue>,
        pause: Arc<PauseFlags>,
    }

    fn rig(origin: Service, prefix: &str, scripts: CommandTable) -> Rig {
        let inbound = Arc::new(RelayQueue::new("in"));
        let reply = Arc::new(RelayQueue::new("reply"));
        let relay = Arc::new(RelayQueue::new("relay"));
        let pause = Arc::new(PauseFlags::default());
        let router = CommandRouter::new(
            origin,
            prefix,
            Arc::clone(&inbound),
            Arc::clone(&reply),
            Arc::clone(&relay),
            Arc::new(scripts),
            Arc::clone(&pause),
        );
        Rig {
            router,
            inbound,
            reply,
            relay,
            pause,
        }
    }

    fn texts(queue: &RelayQueue) -> Vec<String> {
        std::iter::from_fn(|| queue.pop_front()).map(|m| m.text).collect()
    }

    #[rstest]
    #[case("!help", Some("help"))]
    #[case("!HELP me please", Some("help"))]
    #[case("  !Roll 2d6", Some("roll"))]
    #[case("help", None)]
    #[case("!", None)]
    #[case("", None)]
    #[case("say !help", None)]
    fn parses_first_token(#[case] text: &str, #[case] expected: Option<&str>) {
        assert_eq!(parse_command("!", text).as_deref(), expected);
    }

    #[test]
    fn canned_reply_shapes() {
        let game = canned_reply(Service::RuneScape);
        assert_eq!(game.len(), 2);
        assert!(game.iter().all(|m| m.char_len() <= 80 && !m.text.contains('\n')));

        let chat = canned_reply(Service::Discord);
        assert_eq!(chat.len(), 1);
        assert_eq!(chat[0].text.lines().count(), 2);
        assert!(chat[0].text.contains(PROJECT_URL));
        assert!(game[0].text.contains("GNU AGPL-3.0"));
        assert_eq!(
            env!("CARGO_PKG_LICENSE"),
            "AGPL-3.0-or-later",
            "canned replies must state the package license"
        );
    }

    #[rstest]
    #[case("help")]
    #[case("info")]
    #[case("LICENSE")]
    #[case("source")]
    #[tokio::test]
    async fn builtins_reply_to_origin_only(#[case] name: &str) {
        let rig = rig(Service::RuneScape, ".", CommandTable::default());
        let routed = rig
            .router
            .route(RelayMessage::text(format!(".{name}")).with_author("zezima"))
            .await;

        assert!(matches!(routed, Routed::Builtin(_)));
        assert_eq!(rig.reply.len(), 2);
        assert!(rig.relay.is_empty());
    }

    #[tokio::test]
    async fn forwards_ordinary_messages() {
        let rig = rig(Service::Discord, "!", CommandTable::default());
        let routed = rig
            .router
            .route(RelayMessage::text("hello there").with_author("alice"))
            .await;
        assert_eq!(routed, Routed::Forwarded);
        assert_eq!(texts(&rig.relay), ["hello there"]);
        assert!(rig.reply.is_empty());
    }

    #[tokio::test]
    async fn pause_drops_and_resume_forwards_new_messages() {
        let rig = rig(Service::Discord, "!", CommandTable::default());
        rig.pause.pause(Service::RuneScape);
        assert_eq!(
            rig.router.route(RelayMessage::text("while paused")).await,
            Routed::Paused
        );
        assert!(rig.relay.is_empty());

        rig.pause.resume(Service::RuneScape);
        rig.router.route(RelayMessage::text("after resume")).await;
        assert_eq!(texts(&rig.relay), ["after resume"]);
    }

    #[tokio::test]
    async fn pausing_other_direction_does_not_block() {
        let rig = rig(Service::Discord, "!", CommandTable::default());
        rig.pause.pause(Service::Discord);
        assert_eq!(
            rig.router.route(RelayMessage::text("still relayed")).await,
            Routed::Forwarded
        );
    }

    struct Recorder {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
        fail: bool,
    }

    #[async_trait]
    impl ChatScript for Recorder {
        fn name(&self) -> &str {
            self.name
        }

        fn discord_commands(&self) -> Vec<String> {
            vec!["roll".into()]
        }

        async fn on_discord_message(
            &self,
            ctx: &ScriptContext,
            invocation: &ScriptInvocation,
        ) -> anyhow::Result<()> {
            self.log.lock().unwrap().push(self.name.to_string());
            if self.fail {
                anyhow::bail!("dice fell off the table");
            }
            ctx.reply(RelayMessage::text(format!("{} rolled", self.name)));
            ctx.relay(RelayMessage::text(format!("{} tokens", invocation.tokens.len())));
            Ok(())
        }
    }

    #[tokio::test]
    async fn scripts_run_in_order_and_do_not_suppress_relay() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let table = CommandTable::builder()
            .register(Arc::new(Recorder {
                name: "broken",
                log: Arc::clone(&log),
                fail: true,
            }))
            .register(Arc::new(Recorder {
                name: "dice",
                log: Arc::clone(&log),
                fail: false,
            }))
            .build();
        let rig = rig(Service::Discord, "!", table);

        let routed = rig
            .router
            .route(RelayMessage::text("!roll 2d6").with_author("bob"))
            .await;

        assert_eq!(routed, Routed::Forwarded);
        assert_eq!(*log.lock().unwrap(), ["broken", "dice"]);
        assert_eq!(texts(&rig.reply), ["dice rolled"]);
        assert_eq!(texts(&rig.relay), ["2 tokens", "!roll 2d6"]);
    }

    #[tokio::test]
    async fn drains_inbound_in_order() {
        let rig = rig(Service::RuneScape, ".", CommandTable::default());
        for i in 0..10 {
            rig.inbound.append(RelayMessage::text(format!("line {i}")));
        }
        wait_until(|| rig.relay.len() == 10).await;
        assert!(rig.inbound.is_empty());
        let expected: Vec<String> = (0..10).map(|i| format!("line {i}")).collect();
        assert_eq!(texts(&rig.relay), expected);
    }
}
