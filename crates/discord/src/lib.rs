//! Discord implementation of the parley connection traits.
//!
//! REST calls go through serenity's `Http` client; inbound messages arrive
//! through a gateway client started on authentication and are forwarded to
//! the session's dispatcher.

mod convert;
pub mod connection;
pub mod handler;

pub use {
    connection::{DiscordConnection, DiscordConnector},
    handler::DiscordHandler,
};
