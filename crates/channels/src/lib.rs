//! Platform-neutral chat model shared by the session pool, the listener
//! dispatcher and the tool layer.
//!
//! A platform adapter (Discord today) implements [`Connector`] and
//! [`ChatConnection`]; everything above works against those traits. The
//! [`resolve`] module turns human-supplied server/channel names into unique
//! remote resources.

pub mod connection;
pub mod credential;
pub mod error;
pub mod listener;
pub mod resolve;
pub mod session;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod types;

pub use {
    connection::{ChatConnection, Connected, Connector, InboundReceiver, InboundSender},
    credential::Credential,
    error::{Candidate, Error, ResourceKind, Result},
    listener::{HandlerOptions, Listener, ListenerScope, ListenerSnapshot, NewListener},
    resolve::{ChannelFilter, ResolvedChannel, Resolver},
    session::Session,
    types::{
        Author, BotIdentity, ChannelKind, ChannelSummary, ChatMessage, CommandSpec, GuildSummary,
        SentMessage,
    },
};
