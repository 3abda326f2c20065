//! In-memory [`Connector`] and [`ChatConnection`] doubles.

use std::{
    collections::HashMap,
    io,
    sync::{
        Arc, Mutex,
        atomic::{AtomicU64, AtomicUsize, Ordering},
    },
    time::Duration,
};

use {async_trait::async_trait, tokio::sync::mpsc};

use crate::{
    Error, Result,
    connection::{ChatConnection, Connected, Connector, InboundSender},
    credential::Credential,
    types::{
        BotIdentity, ChannelKind, ChannelSummary, ChatMessage, CommandSpec, GuildSummary,
        SentMessage,
    },
};

/// A message recorded by [`FakeConnection::send_message`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentRecord {
    pub channel_id: String,
    pub text: String,
    pub reply_to: Option<String>,
}

/// Scripted platform connection.
pub struct FakeConnection {
    bot: BotIdentity,
    guilds: Vec<GuildSummary>,
    channels: Vec<ChannelSummary>,
    history: HashMap<String, Vec<ChatMessage>>,
    auth_error: Option<String>,
    auth_delay: Option<Duration>,
    shutdown_delay: Option<Duration>,
    pending_failures: AtomicUsize,
    remote_calls: AtomicUsize,
    shutdowns: AtomicUsize,
    next_id: AtomicU64,
    sent: Mutex<Vec<SentRecord>>,
    registered: Mutex<Vec<(Option<String>, Vec<CommandSpec>)>>,
    inbound: Mutex<Option<InboundSender>>,
}

impl Default for FakeConnection {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeConnection {
    pub fn new() -> Self {
        Self {
            bot: BotIdentity {
                user_id: "100".into(),
                username: "parley-bot".into(),
            },
            guilds: Vec::new(),
            channels: Vec::new(),
            history: HashMap::new(),
            auth_error: None,
            auth_delay: None,
            shutdown_delay: None,
            pending_failures: AtomicUsize::new(0),
            remote_calls: AtomicUsize::new(0),
            shutdowns: AtomicUsize::new(0),
            next_id: AtomicU64::new(900_000),
            sent: Mutex::new(Vec::new()),
            registered: Mutex::new(Vec::new()),
            inbound: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn with_bot(mut self, user_id: &str, username: &str) -> Self {
        self.bot = BotIdentity {
            user_id: user_id.into(),
            username: username.into(),
        };
        self
    }

    #[must_use]
    pub fn with_guild(mut self, id: &str, name: &str) -> Self {
        self.guilds.push(GuildSummary {
            id: id.into(),
            name: name.into(),
        });
        self
    }

    #[must_use]
    pub fn with_channel(
        mut self,
        guild_id: &str,
        id: &str,
        name: &str,
        kind: ChannelKind,
        parent_id: Option<&str>,
    ) -> Self {
        self.channels.push(ChannelSummary {
            id: id.into(),
            name: name.into(),
            guild_id: guild_id.into(),
            kind,
            parent_id: parent_id.map(Into::into),
        });
        self
    }

    /// Shorthand for a top-level text channel.
    #[must_use]
    pub fn with_text_channel(self, guild_id: &str, id: &str, name: &str) -> Self {
        self.with_channel(guild_id, id, name, ChannelKind::Text, None)
    }

    /// Channel history, newest first.
    #[must_use]
    pub fn with_history(mut self, channel_id: &str, messages: Vec<ChatMessage>) -> Self {
        self.history.insert(channel_id.into(), messages);
        self
    }

    #[must_use]
    pub fn rejecting_auth(mut self, reason: &str) -> Self {
        self.auth_error = Some(reason.into());
        self
    }

    #[must_use]
    pub fn auth_delay(mut self, delay: Duration) -> Self {
        self.auth_delay = Some(delay);
        self
    }

    #[must_use]
    pub fn shutdown_delay(mut self, delay: Duration) -> Self {
        self.shutdown_delay = Some(delay);
        self
    }

    /// Make the next `n` remote calls fail with a transient error.
    pub fn fail_next(&self, n: usize) {
        self.pending_failures.store(n, Ordering::SeqCst);
    }

    /// Remote calls made so far, failed ones included.
    pub fn remote_calls(&self) -> usize {
        self.remote_calls.load(Ordering::SeqCst)
    }

    pub fn shutdown_count(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<SentRecord> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn registered(&self) -> Vec<(Option<String>, Vec<CommandSpec>)> {
        self.registered
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Deliver an inbound message as if the gateway had received it.
    /// Returns `false` when no dispatcher is listening.
    pub fn push_inbound(&self, message: ChatMessage) -> bool {
        self.inbound
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .is_some_and(|tx| tx.send(message).is_ok())
    }

    fn set_inbound(&self, tx: InboundSender) {
        *self.inbound.lock().unwrap_or_else(|e| e.into_inner()) = Some(tx);
    }

    fn begin_call(&self, op: &str) -> Result<()> {
        self.remote_calls.fetch_add(1, Ordering::SeqCst);
        let injected = self
            .pending_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(Error::transient(
                op.to_string(),
                io::Error::new(io::ErrorKind::TimedOut, "connection timed out"),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl ChatConnection for FakeConnection {
    async fn authenticate(&self) -> Result<BotIdentity> {
        if let Some(delay) = self.auth_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(reason) = &self.auth_error {
            return Err(Error::rejected("authenticate", reason));
        }
        Ok(self.bot.clone())
    }

    async fn guilds(&self) -> Result<Vec<GuildSummary>> {
        self.begin_call("list servers")?;
        Ok(self.guilds.clone())
    }

    async fn guild(&self, id: &str) -> Result<Option<GuildSummary>> {
        self.begin_call("fetch server")?;
        Ok(self.guilds.iter().find(|g| g.id == id).cloned())
    }

    async fn channels(&self, guild_id: &str) -> Result<Vec<ChannelSummary>> {
        self.begin_call("list channels")?;
        Ok(self
            .channels
            .iter()
            .filter(|c| c.guild_id == guild_id)
            .cloned()
            .collect())
    }

    async fn channel(&self, id: &str) -> Result<Option<ChannelSummary>> {
        self.begin_call("fetch channel")?;
        Ok(self.channels.iter().find(|c| c.id == id).cloned())
    }

    async fn send_message(
        &self,
        channel_id: &str,
        text: &str,
        reply_to: Option<&str>,
    ) -> Result<SentMessage> {
        self.begin_call("send message")?;
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(SentRecord {
                channel_id: channel_id.into(),
                text: text.into(),
                reply_to: reply_to.map(Into::into),
            });
        Ok(SentMessage {
            id: self.next_id.fetch_add(1, Ordering::SeqCst).to_string(),
            channel_id: channel_id.into(),
        })
    }

    async fn fetch_messages(&self, channel_id: &str, limit: u8) -> Result<Vec<ChatMessage>> {
        self.begin_call("fetch messages")?;
        Ok(self
            .history
            .get(channel_id)
            .map(|messages| messages.iter().take(limit as usize).cloned().collect())
            .unwrap_or_default())
    }

    async fn register_commands(
        &self,
        guild_id: Option<&str>,
        commands: &[CommandSpec],
    ) -> Result<usize> {
        self.begin_call("register commands")?;
        self.registered
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((guild_id.map(Into::into), commands.to_vec()));
        Ok(commands.len())
    }

    async fn shutdown(&self) {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.shutdown_delay {
            tokio::time::sleep(delay).await;
        }
        self.inbound.lock().unwrap_or_else(|e| e.into_inner()).take();
    }
}

type Factory = dyn Fn(&Credential) -> FakeConnection + Send + Sync;

/// Connector that builds a [`FakeConnection`] per open call.
pub struct FakeConnector {
    factory: Box<Factory>,
    opened: Mutex<Vec<Arc<FakeConnection>>>,
}

impl FakeConnector {
    pub fn new(factory: impl Fn(&Credential) -> FakeConnection + Send + Sync + 'static) -> Self {
        Self {
            factory: Box::new(factory),
            opened: Mutex::new(Vec::new()),
        }
    }

    pub fn open_count(&self) -> usize {
        self.opened.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Connections handed out so far, in open order.
    pub fn opened(&self) -> Vec<Arc<FakeConnection>> {
        self.opened
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn last(&self) -> Option<Arc<FakeConnection>> {
        self.opened
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .last()
            .cloned()
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn open(&self, credential: &Credential) -> Result<Connected> {
        let connection = Arc::new((self.factory)(credential));
        let (tx, rx) = mpsc::unbounded_channel();
        connection.set_inbound(tx);
        self.opened
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Arc::clone(&connection));
        Ok(Connected {
            connection,
            inbound: rx,
        })
    }
}
