//! Listener registration and lookup across sessions.

use std::sync::Arc;

use {
    parley_channels::{
        ChannelFilter, ChatConnection, HandlerOptions, Listener, ListenerScope, ListenerSnapshot,
        NewListener, Resolver, Result, Session,
    },
    tracing::info,
};

/// Arguments for [`ListenerRegistry::add_listener`]. Scope values are names or
/// IDs as the caller typed them.
#[derive(Debug, Clone, Default)]
pub struct AddListener {
    pub server: Option<String>,
    pub channel: Option<String>,
    pub keywords: Vec<String>,
    pub handler_id: String,
    pub handler_options: HandlerOptions,
    pub description: Option<String>,
}

/// Owns every mutation of session listener sets.
#[derive(Debug, Clone, Default)]
pub struct ListenerRegistry {
    resolver: Resolver,
}

impl ListenerRegistry {
    pub fn new(resolver: Resolver) -> Self {
        Self { resolver }
    }

    /// Validate, resolve the scope against the platform, then store.
    ///
    /// The handler is not checked here; it only has to exist when a message
    /// matches.
    pub async fn add_listener(
        &self,
        session: &Session,
        request: AddListener,
    ) -> Result<ListenerSnapshot> {
        let mut listener = Listener::new(NewListener {
            scope: ListenerScope::default(),
            keywords: request.keywords,
            handler_id: request.handler_id,
            handler_options: request.handler_options,
            description: request.description,
        })?;
        listener.scope = self
            .resolve_scope(session, request.server.as_deref(), request.channel.as_deref())
            .await?;

        let snapshot = listener.snapshot(&session.credential_hint());
        session.add_listener(listener)?;
        info!(
            credential = %snapshot.session,
            listener_id = %snapshot.id,
            handler_id = %snapshot.handler_id,
            server_id = snapshot.server_id.as_deref().unwrap_or("*"),
            channel_id = snapshot.channel_id.as_deref().unwrap_or("*"),
            "listener registered"
        );
        Ok(snapshot)
    }

    async fn resolve_scope(
        &self,
        session: &Session,
        server: Option<&str>,
        channel: Option<&str>,
    ) -> Result<ListenerScope> {
        let server = server.map(str::trim).filter(|s| !s.is_empty());
        let channel = channel.map(str::trim).filter(|c| !c.is_empty());
        let conn: &dyn ChatConnection = session.connection().as_ref();

        match (server, channel) {
            (_, Some(channel)) => {
                let resolved = self
                    .resolver
                    .resolve_channel(conn, channel, server, ChannelFilter::TextCapable)
                    .await?;
                Ok(ListenerScope {
                    server_id: Some(resolved.guild.id),
                    channel_id: Some(resolved.channel.id),
                })
            },
            (Some(server), None) => {
                let guild = self.resolver.resolve_guild(conn, Some(server)).await?;
                Ok(ListenerScope {
                    server_id: Some(guild.id),
                    channel_id: None,
                })
            },
            (None, None) => Ok(ListenerScope::default()),
        }
    }

    /// Remove a listener from whichever session owns it.
    pub fn remove_listener(&self, sessions: &[Arc<Session>], listener_id: &str) -> bool {
        let removed = sessions
            .iter()
            .any(|session| session.remove_listener(listener_id));
        if removed {
            info!(listener_id, "listener removed");
        }
        removed
    }

    /// Snapshots of all listeners, optionally limited to one session.
    pub fn list_listeners(
        &self,
        sessions: &[Arc<Session>],
        only: Option<&Session>,
    ) -> Vec<ListenerSnapshot> {
        match only {
            Some(session) => session.listener_snapshots(),
            None => sessions
                .iter()
                .flat_map(|session| session.listener_snapshots())
                .collect(),
        }
    }
}
