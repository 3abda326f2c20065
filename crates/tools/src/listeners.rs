//! Listener and handler management tools.

use std::sync::Arc;

use {
    anyhow::Result,
    async_trait::async_trait,
    parley_auto_reply::AddListener,
    parley_channels::HandlerOptions,
    serde::Deserialize,
    serde_json::{Value, json},
};

use crate::{
    context::ToolContext,
    registry::{AgentTool, parse_args},
};

pub struct AddListenerTool {
    ctx: Arc<ToolContext>,
}

impl AddListenerTool {
    pub fn new(ctx: Arc<ToolContext>) -> Self {
        Self { ctx }
    }
}

#[derive(Debug, Deserialize)]
struct AddArgs {
    credential: Option<String>,
    server: Option<String>,
    channel: Option<String>,
    keywords: Vec<String>,
    handler: String,
    #[serde(default)]
    options: HandlerOptions,
    description: Option<String>,
}

#[async_trait]
impl AgentTool for AddListenerTool {
    fn name(&self) -> &str {
        "add_listener"
    }

    fn description(&self) -> &str {
        "Register a keyword listener: messages containing any keyword \
         (case-insensitive) in the given scope trigger a response handler."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "credential": { "type": "string", "description": "Bot token; defaults to the configured token" },
                "server": { "type": "string", "description": "Limit to this server (name or ID)" },
                "channel": { "type": "string", "description": "Limit to this channel (name or ID)" },
                "keywords": {
                    "type": "array",
                    "items": { "type": "string" },
                    "minItems": 1,
                    "description": "Keywords, matched as case-insensitive substrings"
                },
                "handler": { "type": "string", "description": "Response handler ID (see list_handlers)" },
                "options": { "type": "object", "description": "Handler-specific options" },
                "description": { "type": "string", "description": "Free-form note" }
            },
            "required": ["keywords", "handler"]
        })
    }

    async fn execute(&self, params: Value) -> Result<Value> {
        let args: AddArgs = parse_args(params)?;
        let session = self.ctx.session(args.credential.as_deref()).await?;
        let handler_known = self.ctx.handlers.contains(args.handler.trim());

        let listener = self
            .ctx
            .listeners
            .add_listener(&session, AddListener {
                server: args.server,
                channel: args.channel,
                keywords: args.keywords,
                handler_id: args.handler,
                handler_options: args.options,
                description: args.description,
            })
            .await?;

        let mut out = json!({
            "listener_id": listener.id,
            "listener": listener,
        });
        if !handler_known {
            out["warning"] = json!(format!(
                "handler '{}' is not registered yet; matches will fail until it is",
                listener.handler_id
            ));
        }
        Ok(out)
    }
}

pub struct RemoveListenerTool {
    ctx: Arc<ToolContext>,
}

impl RemoveListenerTool {
    pub fn new(ctx: Arc<ToolContext>) -> Self {
        Self { ctx }
    }
}

#[derive(Debug, Deserialize)]
struct RemoveArgs {
    listener_id: String,
}

#[async_trait]
impl AgentTool for RemoveListenerTool {
    fn name(&self) -> &str {
        "remove_listener"
    }

    fn description(&self) -> &str {
        "Remove a keyword listener by ID, whichever bot owns it."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "listener_id": { "type": "string", "description": "ID returned by add_listener" }
            },
            "required": ["listener_id"]
        })
    }

    async fn execute(&self, params: Value) -> Result<Value> {
        let args: RemoveArgs = parse_args(params)?;
        let sessions = self.ctx.pool.sessions();
        let removed = self
            .ctx
            .listeners
            .remove_listener(&sessions, args.listener_id.trim());
        Ok(json!({
            "listener_id": args.listener_id,
            "removed": removed,
        }))
    }
}

pub struct ListListenersTool {
    ctx: Arc<ToolContext>,
}

impl ListListenersTool {
    pub fn new(ctx: Arc<ToolContext>) -> Self {
        Self { ctx }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ListArgs {
    credential: Option<String>,
}

#[async_trait]
impl AgentTool for ListListenersTool {
    fn name(&self) -> &str {
        "list_listeners"
    }

    fn description(&self) -> &str {
        "List keyword listeners, for one bot token or for every active bot."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "credential": { "type": "string", "description": "Only this bot token's listeners" }
            }
        })
    }

    async fn execute(&self, params: Value) -> Result<Value> {
        let args: ListArgs = parse_args(params)?;
        let sessions = self.ctx.pool.sessions();

        let listeners = match args.credential.as_deref().map(str::trim) {
            Some(token) if !token.is_empty() => {
                let credential = self.ctx.credential(Some(token))?;
                match self.ctx.pool.get(&credential) {
                    Some(session) => self.ctx.listeners.list_listeners(&sessions, Some(&*session)),
                    None => Vec::new(),
                }
            },
            _ => self.ctx.listeners.list_listeners(&sessions, None),
        };

        Ok(json!({
            "count": listeners.len(),
            "listeners": listeners,
        }))
    }
}

pub struct ListHandlersTool {
    ctx: Arc<ToolContext>,
}

impl ListHandlersTool {
    pub fn new(ctx: Arc<ToolContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl AgentTool for ListHandlersTool {
    fn name(&self) -> &str {
        "list_handlers"
    }

    fn description(&self) -> &str {
        "List the response handlers listeners can use."
    }

    fn parameters_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _params: Value) -> Result<Value> {
        let handlers = self.ctx.handlers.list();
        Ok(json!({
            "count": handlers.len(),
            "handlers": handlers,
        }))
    }
}
