use std::sync::Arc;

use {
    parley_auto_reply::{HandlerRegistry, ListenerRegistry},
    parley_channels::{Credential, Error, Resolver, Result, Session},
    parley_sessions::SessionPool,
};

use crate::commands::CommandCatalog;

/// Shared state every tool runs against.
pub struct ToolContext {
    pub pool: Arc<SessionPool>,
    pub resolver: Resolver,
    pub listeners: ListenerRegistry,
    pub handlers: Arc<HandlerRegistry>,
    /// Used when a call does not name a credential.
    pub default_credential: Option<Credential>,
    pub commands: Arc<dyn CommandCatalog>,
    /// Server `register_commands` targets when the call names none.
    pub command_guild: Option<String>,
}

impl ToolContext {
    /// The explicit token if given, the configured default otherwise.
    pub fn credential(&self, explicit: Option<&str>) -> Result<Credential> {
        match explicit.map(str::trim).filter(|t| !t.is_empty()) {
            Some(token) => Ok(Credential::new(token)),
            None => self
                .default_credential
                .clone()
                .filter(|c| !c.is_empty())
                .ok_or_else(|| {
                    Error::invalid_input(
                        "no bot token given and no default token is configured (set DISCORD_TOKEN)",
                    )
                }),
        }
    }

    /// Resolve the session for a call, creating it on first use.
    pub async fn session(&self, explicit: Option<&str>) -> Result<Arc<Session>> {
        let credential = self.credential(explicit)?;
        self.pool.get_or_create(&credential).await
    }
}
