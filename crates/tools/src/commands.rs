//! Administrative command registration.

use std::sync::Arc;

use {
    anyhow::Result,
    async_trait::async_trait,
    parley_channels::CommandSpec,
    serde::Deserialize,
    serde_json::{Value, json},
    tracing::info,
};

use crate::{
    context::ToolContext,
    registry::{AgentTool, parse_args},
};

/// Source of the administrative command definitions pushed to the platform.
pub trait CommandCatalog: Send + Sync {
    fn commands(&self) -> Vec<CommandSpec>;
}

/// Built-in command set.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultCommandCatalog;

impl CommandCatalog for DefaultCommandCatalog {
    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("listeners", "List keyword listeners active for this bot"),
            CommandSpec::new("handlers", "List available response handlers"),
            CommandSpec::new("ping", "Check that the bot is responsive"),
        ]
    }
}

pub struct RegisterCommandsTool {
    ctx: Arc<ToolContext>,
}

impl RegisterCommandsTool {
    pub fn new(ctx: Arc<ToolContext>) -> Self {
        Self { ctx }
    }
}

#[derive(Debug, Deserialize)]
struct RegisterArgs {
    credential: Option<String>,
    server: Option<String>,
}

#[async_trait]
impl AgentTool for RegisterCommandsTool {
    fn name(&self) -> &str {
        "register_commands"
    }

    fn description(&self) -> &str {
        "Register the bot's administrative slash commands, globally or for one server."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "credential": { "type": "string", "description": "Bot token; defaults to the configured token" },
                "server": { "type": "string", "description": "Register only in this server (name or ID); defaults to the configured command server, global otherwise" }
            }
        })
    }

    async fn execute(&self, params: Value) -> Result<Value> {
        let args: RegisterArgs = parse_args(params)?;
        let session = self.ctx.session(args.credential.as_deref()).await?;
        let conn = session.connection();

        let server = args
            .server
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .or(self.ctx.command_guild.as_deref());
        let guild = match server {
            Some(server) => Some(
                self.ctx
                    .resolver
                    .resolve_guild(conn.as_ref(), Some(server))
                    .await?,
            ),
            None => None,
        };

        let commands = self.ctx.commands.commands();
        let registered = conn
            .register_commands(guild.as_ref().map(|g| g.id.as_str()), &commands)
            .await?;
        let scope = guild
            .as_ref()
            .map_or_else(|| "global".to_string(), |g| g.name.clone());
        info!(
            credential = %session.credential_hint(),
            scope = %scope,
            registered,
            "administrative commands registered"
        );

        Ok(json!({
            "registered": registered,
            "scope": scope,
            "commands": commands.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
        }))
    }
}
