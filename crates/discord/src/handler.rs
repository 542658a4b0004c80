//! Discord event handler for serenity.

use std::sync::{Arc, Mutex, OnceLock};

use {
    serenity::{
        all::{
            ActivityData, ChannelId, Context, EventHandler, GatewayIntents, Message, Ready, UserId,
        },
        async_trait,
    },
    tokio::sync::oneshot,
    tracing::{debug, info, trace},
};

use crate::buffer::InboundBuffer;

/// Handler for one gateway session.
pub struct DiscordHandler {
    pub session: u64,
    pub channel_id: ChannelId,
    pub command_prefix: String,
    pub buffer: Arc<InboundBuffer>,
    /// Messages from this user are not relayed. Filled from the ready event
    /// when not configured.
    pub bot_id: OnceLock<UserId>,
    pub ready: Mutex<Option<oneshot::Sender<UserId>>>,
}

impl DiscordHandler {
    /// Required gateway intents for the bot.
    pub fn intents() -> GatewayIntents {
        GatewayIntents::GUILDS | GatewayIntents::GUILD_MESSAGES | GatewayIntents::MESSAGE_CONTENT
    }

    fn should_relay(&self, msg: &Message) -> bool {
        msg.channel_id == self.channel_id
            && self.bot_id.get().is_none_or(|bot| msg.author.id != *bot)
    }
}

/// Server nickname, falling back to the account name.
pub fn display_author(nick: Option<&str>, username: &str) -> String {
    nick.filter(|n| !n.is_empty())
        .unwrap_or(username)
        .to_string()
}

#[async_trait]
impl EventHandler for DiscordHandler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!(
            session = self.session,
            bot_name = %ready.user.name,
            guilds = ready.guilds.len(),
            "discord bot ready"
        );
        let _ = self.bot_id.set(ready.user.id);
        ctx.set_activity(Some(ActivityData::playing(format!(
            "{}help",
            self.command_prefix
        ))));

        let notify = self.ready.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(tx) = notify {
            let _ = tx.send(ready.user.id);
        }
    }

    async fn message(&self, _ctx: Context, msg: Message) {
        if !self.should_relay(&msg) {
            trace!(channel = %msg.channel_id, "ignoring message");
            return;
        }
        let nick = msg.member.as_ref().and_then(|m| m.nick.as_deref());
        let author = display_author(nick, &msg.author.name);
        debug!(session = self.session, %author, "buffering discord message");
        self.buffer.push(self.session, Some(author), msg.content);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {super::*, rstest::rstest};

    #[rstest]
    #[case(Some("Zez"), "zezima", "Zez")]
    #[case(None, "zezima", "zezima")]
    #[case(Some(""), "zezima", "zezima")]
    fn author_prefers_nickname(
        #[case] nick: Option<&str>,
        #[case] username: &str,
        #[case] expected: &str,
    ) {
        assert_eq!(display_author(nick, username), expected);
    }

    #[test]
    fn intents_include_message_content() {
        assert!(DiscordHandler::intents().contains(GatewayIntents::MESSAGE_CONTENT));
    }
}
