use std::{collections::HashMap, sync::Arc};

use {
    anyhow::Result,
    async_trait::async_trait,
    chatsync_common::{RelayMessage, Service},
    tracing::debug,
};

/// Anything a script can push relay messages onto.
pub trait MessageSink: Send + Sync {
    fn push(&self, message: RelayMessage);
}

/// What a script can reach while handling one message.
#[derive(Clone)]
pub struct ScriptContext {
    /// Service the message came from.
    pub origin: Service,
    reply: Arc<dyn MessageSink>,
    relay: Arc<dyn MessageSink>,
}

impl ScriptContext {
    pub fn new(origin: Service, reply: Arc<dyn MessageSink>, relay: Arc<dyn MessageSink>) -> Self {
        Self {
            origin,
            reply,
            relay,
        }
    }

    /// Send a message back to the service the command came from.
    pub fn reply(&self, message: RelayMessage) {
        self.reply.push(message);
    }

    /// Send a message to the other service.
    pub fn relay(&self, message: RelayMessage) {
        self.relay.push(message);
    }
}

/// A message that matched a script command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptInvocation {
    /// Full message text, after normalization.
    pub text: String,
    pub author: Option<String>,
    /// Prefix-stripped, lowercased command name.
    pub command: String,
    /// Whitespace-split message text, command token included.
    pub tokens: Vec<String>,
}

/// A plugin reacting to prefixed commands.
///
/// Handlers do not suppress the relay of the message that triggered them.
#[async_trait]
pub trait ChatScript: Send + Sync {
    fn name(&self) -> &str;

    /// Commands (without prefix) this script handles when typed in game.
    fn runescape_commands(&self) -> Vec<String> {
        Vec::new()
    }

    /// Commands (without prefix) this script handles when typed on Discord.
    fn discord_commands(&self) -> Vec<String> {
        Vec::new()
    }

    async fn on_runescape_message(
        &self,
        _ctx: &ScriptContext,
        _invocation: &ScriptInvocation,
    ) -> Result<()> {
        Ok(())
    }

    async fn on_discord_message(
        &self,
        _ctx: &ScriptContext,
        _invocation: &ScriptInvocation,
    ) -> Result<()> {
        Ok(())
    }
}

/// Dispatch to the handler matching the message origin.
pub async fn invoke_script(
    script: &dyn ChatScript,
    ctx: &ScriptContext,
    invocation: &ScriptInvocation,
) -> Result<()> {
    match ctx.origin {
        Service::RuneScape => script.on_runescape_message(ctx, invocation).await,
        Service::Discord => script.on_discord_message(ctx, invocation).await,
    }
}

type Handlers = HashMap<String, Vec<Arc<dyn ChatScript>>>;

/// Command name → scripts, per source service. Immutable once built.
#[derive(Default, Clone)]
pub struct CommandTable {
    runescape: Handlers,
    discord: Handlers,
}

impl CommandTable {
    pub fn builder() -> CommandTableBuilder {
        CommandTableBuilder::default()
    }

    /// Scripts registered for `command` on `service`, in registration order.
    pub fn handlers(&self, service: Service, command: &str) -> &[Arc<dyn ChatScript>] {
        self.for_service(service)
            .get(command)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.runescape.is_empty() && self.discord.is_empty()
    }

    /// Registered command names for `service`, sorted.
    pub fn commands(&self, service: Service) -> Vec<&str> {
        let mut names: Vec<&str> = self.for_service(service).keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    fn for_service(&self, service: Service) -> &Handlers {
        match service {
            Service::RuneScape => &self.runescape,
            Service::Discord => &self.discord,
        }
    }
}

#[derive(Default)]
pub struct CommandTableBuilder {
    table: CommandTable,
}

impl CommandTableBuilder {
    pub fn register(mut self, script: Arc<dyn ChatScript>) -> Self {
        for command in script.runescape_commands() {
            let command = command.to_lowercase();
            debug!(
                script = script.name(),
                service = "runescape",
                command = %command,
                "registered script command"
            );
            self.table
                .runescape
                .entry(command)
                .or_default()
                .push(Arc::clone(&script));
        }
        for command in script.discord_commands() {
            let command = command.to_lowercase();
            debug!(
                script = script.name(),
                service = "discord",
                command = %command,
                "registered script command"
            );
            self.table
                .discord
                .entry(command)
                .or_default()
                .push(Arc::clone(&script));
        }
        self
    }

    pub fn build(self) -> CommandTable {
        self.table
    }
}
