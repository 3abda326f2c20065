use std::sync::{Arc, Mutex};

use {
    async_trait::async_trait,
    parley_channels::{
        BotIdentity, ChannelSummary, ChatConnection, ChatMessage, CommandSpec, Connected,
        Connector, Credential, Error, GuildSummary, InboundSender, Result, SentMessage,
    },
    serenity::{
        Client,
        all::{
            ChannelId, Command, CreateCommand, CreateMessage, GetMessages, GuildId,
            GuildPagination, MessageId, ShardManager,
        },
        http::Http,
    },
    tokio::{sync::mpsc, task::JoinHandle},
    tracing::{debug, error, info},
};

use crate::{
    convert::{Failure, classify_status, status_of, to_channel_summary, to_chat_message, to_error},
    handler::DiscordHandler,
};

/// Builds [`DiscordConnection`]s. Opening does no network I/O.
#[derive(Debug, Default, Clone)]
pub struct DiscordConnector;

impl DiscordConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for DiscordConnector {
    async fn open(&self, credential: &Credential) -> Result<Connected> {
        let (tx, rx) = mpsc::unbounded_channel();
        let connection = DiscordConnection::new(credential.clone(), tx);
        Ok(Connected {
            connection: Arc::new(connection),
            inbound: rx,
        })
    }
}

struct Gateway {
    shard_manager: Arc<ShardManager>,
    task: JoinHandle<()>,
}

/// One bot token's REST client plus its gateway connection.
pub struct DiscordConnection {
    credential: Credential,
    http: Arc<Http>,
    /// Handed to the gateway handler on authentication.
    inbound: Mutex<Option<InboundSender>>,
    gateway: Mutex<Option<Gateway>>,
}

impl DiscordConnection {
    pub fn new(credential: Credential, inbound: InboundSender) -> Self {
        let http = Arc::new(Http::new(credential.expose()));
        Self {
            credential,
            http,
            inbound: Mutex::new(Some(inbound)),
            gateway: Mutex::new(None),
        }
    }

    async fn start_gateway(&self, bot_user_id: u64) -> Result<()> {
        let inbound = self
            .inbound
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        let Some(inbound) = inbound else {
            debug!(credential = %self.credential.hint(), "gateway already started");
            return Ok(());
        };

        let handler = DiscordHandler {
            bot_user_id,
            credential_hint: self.credential.hint(),
            inbound,
        };
        let mut client = Client::builder(self.credential.expose(), DiscordHandler::intents())
            .event_handler(handler)
            .await
            .map_err(|e| to_error("start gateway", e))?;

        let shard_manager = Arc::clone(&client.shard_manager);
        let hint = self.credential.hint();
        let task = tokio::spawn(async move {
            if let Err(e) = client.start().await {
                error!(credential = %hint, error = %e, "discord gateway stopped");
            }
        });

        *self.gateway.lock().unwrap_or_else(|e| e.into_inner()) = Some(Gateway {
            shard_manager,
            task,
        });
        Ok(())
    }

    /// Lookups treat "unknown"/"forbidden" responses as absent.
    fn lookup_result<T>(context: &str, result: serenity::Result<T>) -> Result<Option<T>> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(e) if classify_status(status_of(&e)) == Failure::Missing => {
                debug!(error = %e, "{context}: not found");
                Ok(None)
            },
            Err(e) => Err(to_error(context, e)),
        }
    }
}

fn parse_id(value: &str) -> Option<u64> {
    value.parse::<u64>().ok().filter(|id| *id != 0)
}

/// Largest page `GET /users/@me/guilds` returns.
const GUILD_PAGE_LIMIT: u64 = 200;

/// A full page means there may be more after its last guild.
fn has_next_page(page_len: usize, limit: u64) -> bool {
    page_len as u64 >= limit
}

#[async_trait]
impl ChatConnection for DiscordConnection {
    async fn authenticate(&self) -> Result<BotIdentity> {
        let user = self
            .http
            .get_current_user()
            .await
            .map_err(|e| to_error("authenticate", e))?;
        let identity = BotIdentity {
            user_id: user.id.to_string(),
            username: user.name.clone(),
        };

        self.start_gateway(user.id.get()).await?;
        info!(
            credential = %self.credential.hint(),
            bot = %identity.username,
            "discord bot authenticated"
        );
        Ok(identity)
    }

    async fn guilds(&self) -> Result<Vec<GuildSummary>> {
        let mut summaries = Vec::new();
        let mut after: Option<GuildId> = None;
        loop {
            let page = self
                .http
                .get_guilds(after.map(GuildPagination::After), Some(GUILD_PAGE_LIMIT))
                .await
                .map_err(|e| to_error("list servers", e))?;
            let full = has_next_page(page.len(), GUILD_PAGE_LIMIT);
            after = page.last().map(|g| g.id);
            summaries.extend(page.into_iter().map(|g| GuildSummary {
                id: g.id.to_string(),
                name: g.name,
            }));
            if !full || after.is_none() {
                break;
            }
            debug!(fetched = summaries.len(), "fetching next page of servers");
        }
        Ok(summaries)
    }

    async fn guild(&self, id: &str) -> Result<Option<GuildSummary>> {
        let Some(id) = parse_id(id) else {
            return Ok(None);
        };
        let guild = Self::lookup_result(
            "fetch server",
            self.http.get_guild(GuildId::new(id)).await,
        )?;
        Ok(guild.map(|g| GuildSummary {
            id: g.id.to_string(),
            name: g.name,
        }))
    }

    async fn channels(&self, guild_id: &str) -> Result<Vec<ChannelSummary>> {
        let Some(id) = parse_id(guild_id) else {
            return Ok(Vec::new());
        };
        let channels = self
            .http
            .get_channels(GuildId::new(id))
            .await
            .map_err(|e| to_error("list channels", e))?;
        Ok(channels.iter().map(to_channel_summary).collect())
    }

    async fn channel(&self, id: &str) -> Result<Option<ChannelSummary>> {
        let Some(id) = parse_id(id) else {
            return Ok(None);
        };
        let channel = Self::lookup_result(
            "fetch channel",
            self.http.get_channel(ChannelId::new(id)).await,
        )?;
        Ok(channel
            .and_then(|c| c.guild())
            .map(|c| to_channel_summary(&c)))
    }

    async fn send_message(
        &self,
        channel_id: &str,
        text: &str,
        reply_to: Option<&str>,
    ) -> Result<SentMessage> {
        let channel = parse_id(channel_id)
            .map(ChannelId::new)
            .ok_or_else(|| Error::invalid_input("malformed channel ID"))?;

        let mut builder = CreateMessage::new().content(text);
        if let Some(reply_id) = reply_to.and_then(parse_id) {
            builder = builder.reference_message((channel, MessageId::new(reply_id)));
        }
        let sent = channel
            .send_message(&*self.http, builder)
            .await
            .map_err(|e| to_error("send message", e))?;
        Ok(SentMessage {
            id: sent.id.to_string(),
            channel_id: sent.channel_id.to_string(),
        })
    }

    async fn fetch_messages(&self, channel_id: &str, limit: u8) -> Result<Vec<ChatMessage>> {
        let channel = parse_id(channel_id)
            .map(ChannelId::new)
            .ok_or_else(|| Error::invalid_input("malformed channel ID"))?;
        let messages = channel
            .messages(&*self.http, GetMessages::new().limit(limit))
            .await
            .map_err(|e| to_error("fetch messages", e))?;
        Ok(messages.iter().map(to_chat_message).collect())
    }

    async fn register_commands(
        &self,
        guild_id: Option<&str>,
        commands: &[CommandSpec],
    ) -> Result<usize> {
        let builders: Vec<CreateCommand> = commands
            .iter()
            .map(|c| CreateCommand::new(&c.name).description(&c.description))
            .collect();

        let registered = match guild_id {
            Some(guild_id) => {
                let guild = parse_id(guild_id).map(GuildId::new).ok_or_else(|| {
                    Error::invalid_input("malformed server ID")
                })?;
                guild
                    .set_commands(&self.http, builders)
                    .await
                    .map_err(|e| to_error("register server commands", e))?
            },
            None => Command::set_global_commands(&self.http, builders)
                .await
                .map_err(|e| to_error("register global commands", e))?,
        };
        Ok(registered.len())
    }

    async fn shutdown(&self) {
        self.inbound
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        let gateway = self
            .gateway
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        let Some(gateway) = gateway else {
            return;
        };
        gateway.shard_manager.shutdown_all().await;
        gateway.task.abort();
        debug!(credential = %self.credential.hint(), "discord connection shut down");
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_must_be_non_zero_integers() {
        assert_eq!(parse_id("1234"), Some(1234));
        assert_eq!(parse_id("0"), None);
        assert_eq!(parse_id("general"), None);
    }

    #[test]
    fn only_full_guild_pages_continue() {
        assert!(has_next_page(200, GUILD_PAGE_LIMIT));
        assert!(!has_next_page(199, GUILD_PAGE_LIMIT));
        assert!(!has_next_page(0, GUILD_PAGE_LIMIT));
    }
}
