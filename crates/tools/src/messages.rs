//! Message send and read tools.

use std::sync::Arc;

use {
    anyhow::Result,
    async_trait::async_trait,
    parley_channels::{ChannelFilter, Error},
    serde::{Deserialize, Serialize},
    serde_json::{Value, json},
    tracing::{info, warn},
};

use crate::{
    context::ToolContext,
    registry::{AgentTool, parse_args},
};

/// Platform limit for one message.
const MAX_MESSAGE_CHARS: usize = 2000;
const DEFAULT_READ_LIMIT: u8 = 50;
const MAX_READ_LIMIT: u8 = 100;

pub struct SendMessageTool {
    ctx: Arc<ToolContext>,
}

impl SendMessageTool {
    pub fn new(ctx: Arc<ToolContext>) -> Self {
        Self { ctx }
    }
}

#[derive(Debug, Deserialize)]
struct SendArgs {
    credential: Option<String>,
    channel: String,
    server: Option<String>,
    message: String,
}

#[async_trait]
impl AgentTool for SendMessageTool {
    fn name(&self) -> &str {
        "send_message"
    }

    fn description(&self) -> &str {
        "Send a text message to a Discord channel. The channel may be given by name \
         (with or without '#') or ID; the server is required only when the bot is in \
         more than one."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "credential": { "type": "string", "description": "Bot token; defaults to the configured token" },
                "channel": { "type": "string", "description": "Channel name or ID" },
                "server": { "type": "string", "description": "Server name or ID" },
                "message": { "type": "string", "description": "Message text (max 2000 characters)" }
            },
            "required": ["channel", "message"]
        })
    }

    async fn execute(&self, params: Value) -> Result<Value> {
        let args: SendArgs = parse_args(params)?;
        if args.message.trim().is_empty() {
            return Err(Error::invalid_input("message must not be empty").into());
        }
        let length = args.message.chars().count();
        if length > MAX_MESSAGE_CHARS {
            return Err(Error::invalid_input(format!(
                "message is {length} characters; the limit is {MAX_MESSAGE_CHARS}"
            ))
            .into());
        }

        let session = self.ctx.session(args.credential.as_deref()).await?;
        let conn = session.connection();
        let target = self
            .ctx
            .resolver
            .resolve_channel(
                conn.as_ref(),
                &args.channel,
                args.server.as_deref(),
                ChannelFilter::TextCapable,
            )
            .await?;

        let sent = conn
            .send_message(&target.channel.id, &args.message, None)
            .await?;
        info!(
            credential = %session.credential_hint(),
            channel_id = %target.channel.id,
            message_id = %sent.id,
            "message sent"
        );

        Ok(json!({
            "message": format!(
                "Message sent to #{} in {} (message ID: {})",
                target.channel.name, target.guild.name, sent.id
            ),
            "message_id": sent.id,
            "channel": { "id": target.channel.id, "name": target.channel.name },
            "server": { "id": target.guild.id, "name": target.guild.name },
        }))
    }
}

pub struct ReadMessagesTool {
    ctx: Arc<ToolContext>,
}

impl ReadMessagesTool {
    pub fn new(ctx: Arc<ToolContext>) -> Self {
        Self { ctx }
    }
}

#[derive(Debug, Deserialize)]
struct ReadArgs {
    credential: Option<String>,
    channel: String,
    server: Option<String>,
    limit: Option<i64>,
}

/// One message as returned to the caller.
#[derive(Debug, Serialize)]
struct MessageRecord {
    id: String,
    channel: String,
    server: String,
    author: String,
    content: String,
    timestamp: String,
}

fn read_limit(requested: Option<i64>) -> std::result::Result<u8, Error> {
    match requested {
        None => Ok(DEFAULT_READ_LIMIT),
        Some(n) if (1..=i64::from(MAX_READ_LIMIT)).contains(&n) => Ok(n as u8),
        Some(n) => Err(Error::invalid_input(format!(
            "limit must be between 1 and {MAX_READ_LIMIT}, got {n}"
        ))),
    }
}

#[async_trait]
impl AgentTool for ReadMessagesTool {
    fn name(&self) -> &str {
        "read_messages"
    }

    fn description(&self) -> &str {
        "Read recent messages from a Discord channel, newest first."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "credential": { "type": "string", "description": "Bot token; defaults to the configured token" },
                "channel": { "type": "string", "description": "Channel name or ID" },
                "server": { "type": "string", "description": "Server name or ID" },
                "limit": {
                    "type": "integer",
                    "minimum": 1,
                    "maximum": MAX_READ_LIMIT,
                    "default": DEFAULT_READ_LIMIT,
                    "description": "Number of messages to fetch"
                }
            },
            "required": ["channel"]
        })
    }

    async fn execute(&self, params: Value) -> Result<Value> {
        let args: ReadArgs = parse_args(params)?;
        let limit = read_limit(args.limit)?;

        let session = self.ctx.session(args.credential.as_deref()).await?;
        let conn = session.connection();
        let target = self
            .ctx
            .resolver
            .resolve_channel(
                conn.as_ref(),
                &args.channel,
                args.server.as_deref(),
                ChannelFilter::TextCapable,
            )
            .await?;

        let channel_id = target.channel.id.as_str();
        let messages = self
            .ctx
            .resolver
            .policy()
            .execute_when(
                || conn.fetch_messages(channel_id, limit),
                Error::is_retryable,
                |retry| {
                    warn!(
                        attempt = retry.attempt,
                        error = %retry.error,
                        "fetching messages failed, retrying"
                    );
                },
            )
            .await?;

        let records: Vec<MessageRecord> = messages
            .into_iter()
            .map(|m| MessageRecord {
                author: m.author.label().to_string(),
                id: m.id,
                channel: target.channel.name.clone(),
                server: target.guild.name.clone(),
                content: m.content,
                timestamp: m.timestamp,
            })
            .collect();

        Ok(json!({
            "count": records.len(),
            "messages": records,
        }))
    }
}
