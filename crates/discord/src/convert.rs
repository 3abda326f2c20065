//! Mapping between serenity models and the parley data model.

use {
    parley_channels::{Author, ChannelKind, ChannelSummary, ChatMessage, Error},
    serenity::{
        all::{ChannelType, GuildChannel, Message},
        http::HttpError,
    },
};

pub(crate) fn to_chat_message(m: &Message) -> ChatMessage {
    ChatMessage {
        id: m.id.to_string(),
        channel_id: m.channel_id.to_string(),
        guild_id: m.guild_id.map(|g| g.to_string()),
        author: Author {
            id: m.author.id.to_string(),
            name: m.author.name.clone(),
            display_name: m.author.global_name.clone(),
            bot: m.author.bot,
        },
        content: m.content.clone(),
        timestamp: m.timestamp.to_rfc3339().unwrap_or_default(),
    }
}

pub(crate) fn to_channel_summary(c: &GuildChannel) -> ChannelSummary {
    ChannelSummary {
        id: c.id.to_string(),
        name: c.name.clone(),
        guild_id: c.guild_id.to_string(),
        kind: channel_kind(c.kind),
        parent_id: c.parent_id.map(|p| p.to_string()),
    }
}

pub(crate) fn channel_kind(kind: ChannelType) -> ChannelKind {
    match kind {
        ChannelType::Text => ChannelKind::Text,
        ChannelType::News => ChannelKind::Announcement,
        ChannelType::NewsThread | ChannelType::PublicThread | ChannelType::PrivateThread => {
            ChannelKind::Thread
        },
        ChannelType::Voice => ChannelKind::Voice,
        ChannelType::Stage => ChannelKind::Stage,
        ChannelType::Category => ChannelKind::Category,
        ChannelType::Forum => ChannelKind::Forum,
        _ => ChannelKind::Other,
    }
}

/// How a failed request should surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Failure {
    /// Unknown or inaccessible ID; lookups report "absent".
    Missing,
    Unauthorized,
    Rejected,
    Transient,
}

/// Classify by HTTP status. No status means the request never completed.
pub(crate) fn classify_status(status: Option<u16>) -> Failure {
    match status {
        Some(401) => Failure::Unauthorized,
        Some(400 | 403 | 404) => Failure::Missing,
        Some(408 | 429) => Failure::Transient,
        Some(s) if (400..500).contains(&s) => Failure::Rejected,
        _ => Failure::Transient,
    }
}

pub(crate) fn status_of(err: &serenity::Error) -> Option<u16> {
    match err {
        serenity::Error::Http(HttpError::UnsuccessfulRequest(response)) => {
            Some(response.status_code.as_u16())
        },
        _ => None,
    }
}

/// Convert a serenity error into the shared taxonomy.
pub(crate) fn to_error(context: &str, err: serenity::Error) -> Error {
    match classify_status(status_of(&err)) {
        Failure::Transient => Error::transient(context, err),
        Failure::Unauthorized => Error::rejected(context, "the bot token was rejected (401)"),
        Failure::Missing | Failure::Rejected => Error::rejected(context, err),
    }
}
