//! Gateway event handler.

use {
    parley_channels::InboundSender,
    serenity::{
        all::{Context, EventHandler, GatewayIntents, GuildId, Message, Ready},
        async_trait,
    },
    tracing::{debug, info, trace},
};

use crate::convert::to_chat_message;

/// Forwards every inbound message to the session's dispatch queue.
pub struct DiscordHandler {
    pub bot_user_id: u64,
    pub credential_hint: String,
    pub inbound: InboundSender,
}

impl DiscordHandler {
    /// Required gateway intents for the bot.
    pub fn intents() -> GatewayIntents {
        GatewayIntents::GUILDS
            | GatewayIntents::GUILD_MESSAGES
            | GatewayIntents::DIRECT_MESSAGES
            | GatewayIntents::MESSAGE_CONTENT
    }
}

#[async_trait]
impl EventHandler for DiscordHandler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!(
            credential = %self.credential_hint,
            bot_name = %ready.user.name,
            guilds = ready.guilds.len(),
            "discord gateway ready"
        );
    }

    async fn message(&self, _ctx: Context, msg: Message) {
        // Own messages never reach the dispatcher.
        if msg.author.id.get() == self.bot_user_id {
            return;
        }
        trace!(
            credential = %self.credential_hint,
            channel_id = %msg.channel_id,
            message_id = %msg.id,
            "inbound message"
        );
        if self.inbound.send(to_chat_message(&msg)).is_err() {
            debug!(credential = %self.credential_hint, "dispatcher gone, dropping message");
        }
    }

    async fn cache_ready(&self, _ctx: Context, guilds: Vec<GuildId>) {
        debug!(
            credential = %self.credential_hint,
            guild_count = guilds.len(),
            "discord cache ready"
        );
    }
}
