//! Tool-call boundary.
//!
//! Each tool takes JSON arguments and returns a JSON payload. Failures never
//! escape as raw errors: [`ToolRegistry::call`] turns them into
//! `{"ok": false, "error": "..."}` with a stable, descriptive message.
//!
//! Tools: send_message, read_messages, add_listener, remove_listener,
//! list_listeners, list_handlers, register_commands.

pub mod commands;
pub mod context;
pub mod listeners;
pub mod messages;
pub mod registry;

pub use {
    commands::{CommandCatalog, DefaultCommandCatalog, RegisterCommandsTool},
    context::ToolContext,
    listeners::{AddListenerTool, ListHandlersTool, ListListenersTool, RemoveListenerTool},
    messages::{ReadMessagesTool, SendMessageTool},
    registry::{AgentTool, ToolRegistry, parse_args},
};

use std::sync::Arc;

/// Registry with every parley tool bound to `ctx`.
pub fn default_registry(ctx: Arc<ToolContext>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(SendMessageTool::new(Arc::clone(&ctx))));
    registry.register(Box::new(ReadMessagesTool::new(Arc::clone(&ctx))));
    registry.register(Box::new(AddListenerTool::new(Arc::clone(&ctx))));
    registry.register(Box::new(RemoveListenerTool::new(Arc::clone(&ctx))));
    registry.register(Box::new(ListListenersTool::new(Arc::clone(&ctx))));
    registry.register(Box::new(ListHandlersTool::new(Arc::clone(&ctx))));
    registry.register(Box::new(RegisterCommandsTool::new(ctx)));
    registry
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::{sync::Arc, time::Duration};

    use {
        parley_auto_reply::{Dispatcher, HandlerRegistry, ListenerRegistry},
        parley_channels::{
            ChannelKind, Credential, Resolver,
            testing::{FakeConnection, FakeConnector},
        },
        parley_common::RetryPolicy,
        parley_sessions::{PoolConfig, SessionPool},
    };

    use crate::{commands::DefaultCommandCatalog, context::ToolContext};

    pub const TOKEN: &str = "default-token-for-tests-0042";

    pub fn hub() -> FakeConnection {
        FakeConnection::new()
            .with_guild("1000", "Rust Hub")
            .with_channel("1000", "2000", "Text", ChannelKind::Category, None)
            .with_channel("1000", "2001", "general", ChannelKind::Text, Some("2000"))
            .with_channel("1000", "2002", "random", ChannelKind::Text, Some("2000"))
    }

    pub fn context_with(
        factory: impl Fn(&Credential) -> FakeConnection + Send + Sync + 'static,
    ) -> (Arc<ToolContext>, Arc<FakeConnector>) {
        let connector = Arc::new(FakeConnector::new(factory));
        let handlers = Arc::new(HandlerRegistry::with_builtins());
        let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&handlers)));
        let pool = SessionPool::new(connector.clone(), dispatcher, PoolConfig::default());
        let resolver = Resolver::new(RetryPolicy::new(3, Duration::from_millis(5)));
        let ctx = ToolContext {
            pool,
            resolver: resolver.clone(),
            listeners: ListenerRegistry::new(resolver),
            handlers,
            default_credential: Some(Credential::new(TOKEN)),
            commands: Arc::new(DefaultCommandCatalog),
            command_guild: None,
        };
        (Arc::new(ctx), connector)
    }

    pub fn context() -> (Arc<ToolContext>, Arc<FakeConnector>) {
        context_with(|_| hub())
    }
}
