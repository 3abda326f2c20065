use std::sync::Arc;

use {async_trait::async_trait, tokio::sync::mpsc};

use crate::{
    Result,
    credential::Credential,
    types::{BotIdentity, ChannelSummary, ChatMessage, CommandSpec, GuildSummary, SentMessage},
};

/// Receiving end of a connection's inbound message stream.
pub type InboundReceiver = mpsc::UnboundedReceiver<ChatMessage>;

/// Sending end, held by the platform event handler.
pub type InboundSender = mpsc::UnboundedSender<ChatMessage>;

/// One live connection to the chat platform for one credential.
///
/// Lookups return `Ok(None)` when the platform reports the ID as unknown or
/// inaccessible, and `Err` for transport-level failures, so callers can fall
/// back to name matching without swallowing outages.
#[async_trait]
pub trait ChatConnection: Send + Sync {
    /// Verify the credential and bring the connection up.
    ///
    /// Called once, before any other method.
    async fn authenticate(&self) -> Result<BotIdentity>;

    /// Servers the bot is a member of.
    async fn guilds(&self) -> Result<Vec<GuildSummary>>;

    async fn guild(&self, id: &str) -> Result<Option<GuildSummary>>;

    /// All channels of a server, categories included.
    async fn channels(&self, guild_id: &str) -> Result<Vec<ChannelSummary>>;

    async fn channel(&self, id: &str) -> Result<Option<ChannelSummary>>;

    async fn send_message(
        &self,
        channel_id: &str,
        text: &str,
        reply_to: Option<&str>,
    ) -> Result<SentMessage>;

    /// Most recent messages, newest first as the platform returns them.
    async fn fetch_messages(&self, channel_id: &str, limit: u8) -> Result<Vec<ChatMessage>>;

    /// Replace the administrative command set, globally or for one server.
    /// Returns how many commands the platform accepted.
    async fn register_commands(
        &self,
        guild_id: Option<&str>,
        commands: &[CommandSpec],
    ) -> Result<usize>;

    /// Close the connection and release its resources. Idempotent.
    async fn shutdown(&self);
}

/// A freshly opened, not yet authenticated connection and its inbound stream.
pub struct Connected {
    pub connection: Arc<dyn ChatConnection>,
    pub inbound: InboundReceiver,
}

/// Factory for platform connections.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Build a connection for `credential` without contacting the platform.
    async fn open(&self, credential: &Credential) -> Result<Connected>;
}
