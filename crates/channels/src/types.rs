//! Plain data records exchanged with the platform adapter.

use serde::{Deserialize, Serialize};

/// A server (Discord guild) the bot is a member of.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildSummary {
    pub id: String,
    pub name: String,
}

/// Channel flavour, reduced to what resolution and dispatch care about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    Text,
    Announcement,
    Thread,
    Voice,
    Stage,
    Category,
    Forum,
    Other,
}

impl ChannelKind {
    /// Whether messages can be posted to and read from this channel.
    pub fn is_text_capable(self) -> bool {
        matches!(self, Self::Text | Self::Announcement | Self::Thread)
    }
}

impl std::fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Text => "text",
            Self::Announcement => "announcement",
            Self::Thread => "thread",
            Self::Voice => "voice",
            Self::Stage => "stage",
            Self::Category => "category",
            Self::Forum => "forum",
            Self::Other => "unsupported",
        };
        f.write_str(name)
    }
}

/// A channel inside a server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSummary {
    pub id: String,
    pub name: String,
    pub guild_id: String,
    pub kind: ChannelKind,
    /// Category (or parent channel, for threads).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

/// Message author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    pub bot: bool,
}

impl Author {
    /// Display name when set, account name otherwise.
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.name)
    }
}

/// An inbound or fetched chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub channel_id: String,
    /// `None` for direct messages.
    pub guild_id: Option<String>,
    pub author: Author,
    pub content: String,
    /// RFC 3339 timestamp.
    pub timestamp: String,
}

/// Confirmation of a delivered message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentMessage {
    pub id: String,
    pub channel_id: String,
}

/// The bot account a credential authenticates as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotIdentity {
    pub user_id: String,
    pub username: String,
}

/// An administrative command definition handed to the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    pub name: String,
    pub description: String,
}

impl CommandSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}
