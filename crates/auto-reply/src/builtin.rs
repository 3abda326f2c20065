//! Built-in response handlers.

use std::sync::Arc;

use {
    anyhow::bail,
    async_trait::async_trait,
    parley_channels::{ChatMessage, HandlerOptions, Session},
    serde::Deserialize,
    tracing::info,
};

use crate::handler::{HandlerRegistry, ResponseHandler, parse_options};

pub fn register_builtins(registry: &HandlerRegistry) {
    registry.register(Arc::new(ReplyHandler));
    registry.register(Arc::new(EchoHandler));
    registry.register(Arc::new(LogHandler));
}

/// Replies with a fixed message.
///
/// Options: `message` (required), `mention` (reply to the triggering message,
/// default `false`).
pub struct ReplyHandler;

#[derive(Deserialize)]
struct ReplyOptions {
    message: String,
    #[serde(default)]
    mention: bool,
}

#[async_trait]
impl ResponseHandler for ReplyHandler {
    fn id(&self) -> &str {
        "reply"
    }

    fn name(&self) -> &str {
        "Reply"
    }

    fn description(&self) -> &str {
        "Reply with a fixed message (options: message, mention)"
    }

    async fn invoke(
        &self,
        message: &ChatMessage,
        session: &Session,
        options: &HandlerOptions,
    ) -> anyhow::Result<()> {
        let opts: ReplyOptions = parse_options(options)?;
        if opts.message.trim().is_empty() {
            bail!("reply message must not be empty");
        }
        let reply_to = opts.mention.then_some(message.id.as_str());
        session
            .connection()
            .send_message(&message.channel_id, &opts.message, reply_to)
            .await?;
        Ok(())
    }
}

/// Echoes the triggering message back, with an optional prefix.
pub struct EchoHandler;

#[derive(Deserialize, Default)]
struct EchoOptions {
    #[serde(default)]
    prefix: String,
}

#[async_trait]
impl ResponseHandler for EchoHandler {
    fn id(&self) -> &str {
        "echo"
    }

    fn name(&self) -> &str {
        "Echo"
    }

    fn description(&self) -> &str {
        "Echo the message content back to the channel (options: prefix)"
    }

    async fn invoke(
        &self,
        message: &ChatMessage,
        session: &Session,
        options: &HandlerOptions,
    ) -> anyhow::Result<()> {
        let opts: EchoOptions = parse_options(options)?;
        let text = format!("{}{}", opts.prefix, message.content);
        session
            .connection()
            .send_message(&message.channel_id, &text, None)
            .await?;
        Ok(())
    }
}

/// Logs the match and does nothing else.
pub struct LogHandler;

#[derive(Deserialize, Default)]
struct LogOptions {
    label: Option<String>,
}

#[async_trait]
impl ResponseHandler for LogHandler {
    fn id(&self) -> &str {
        "log"
    }

    fn name(&self) -> &str {
        "Log"
    }

    fn description(&self) -> &str {
        "Log matching messages without replying (options: label)"
    }

    async fn invoke(
        &self,
        message: &ChatMessage,
        session: &Session,
        options: &HandlerOptions,
    ) -> anyhow::Result<()> {
        let opts: LogOptions = parse_options(options)?;
        info!(
            credential = %session.credential_hint(),
            label = opts.label.as_deref().unwrap_or("listener"),
            channel_id = %message.channel_id,
            author = %message.author.label(),
            "keyword match: {}",
            message.content,
        );
        Ok(())
    }
}
