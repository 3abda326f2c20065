//! Keyword listeners: standing rules that route matching inbound messages to
//! a response handler.

use std::time::{SystemTime, UNIX_EPOCH};

use {
    serde::{Deserialize, Serialize},
    serde_json::{Map, Value},
};

use crate::{Error, Result, types::ChatMessage};

/// Handler-defined configuration payload, validated by the handler itself.
pub type HandlerOptions = Map<String, Value>;

/// Where a listener applies. `None` means "any".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListenerScope {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
}

impl ListenerScope {
    pub fn admits(&self, message: &ChatMessage) -> bool {
        if let Some(server_id) = &self.server_id
            && message.guild_id.as_deref() != Some(server_id.as_str())
        {
            return false;
        }
        if let Some(channel_id) = &self.channel_id
            && message.channel_id != *channel_id
        {
            return false;
        }
        true
    }
}

/// Parameters for a new listener, after scope resolution.
#[derive(Debug, Clone, Default)]
pub struct NewListener {
    pub scope: ListenerScope,
    pub keywords: Vec<String>,
    pub handler_id: String,
    pub handler_options: HandlerOptions,
    pub description: Option<String>,
}

/// A registered listener, owned by exactly one session.
#[derive(Debug, Clone, PartialEq)]
pub struct Listener {
    pub id: String,
    pub scope: ListenerScope,
    pub keywords: Vec<String>,
    pub handler_id: String,
    pub handler_options: HandlerOptions,
    pub description: Option<String>,
    pub active: bool,
    pub created_at_ms: u64,
    folded_keywords: Vec<String>,
}

impl Listener {
    /// Validate `spec` and assign a fresh ID.
    pub fn new(spec: NewListener) -> Result<Self> {
        // Stored verbatim: surrounding spaces are part of the keyword.
        let keywords: Vec<String> = spec
            .keywords
            .into_iter()
            .filter(|k| !k.trim().is_empty())
            .collect();
        if keywords.is_empty() {
            return Err(Error::invalid_input(
                "at least one non-empty keyword is required",
            ));
        }
        let handler_id = spec.handler_id.trim().to_string();
        if handler_id.is_empty() {
            return Err(Error::invalid_input("handler ID must not be empty"));
        }

        let folded_keywords = keywords.iter().map(|k| k.to_lowercase()).collect();
        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            scope: spec.scope,
            keywords,
            handler_id,
            handler_options: spec.handler_options,
            description: spec.description.filter(|d| !d.trim().is_empty()),
            active: true,
            created_at_ms: now_ms(),
            folded_keywords,
        })
    }

    /// Case-insensitive substring match against any keyword.
    pub fn matches_text(&self, text: &str) -> bool {
        let folded = text.to_lowercase();
        self.folded_keywords
            .iter()
            .any(|keyword| folded.contains(keyword.as_str()))
    }

    /// Scope and keyword check for one inbound message.
    pub fn matches(&self, message: &ChatMessage) -> bool {
        self.active && self.scope.admits(message) && self.matches_text(&message.content)
    }

    pub fn snapshot(&self, session: &str) -> ListenerSnapshot {
        ListenerSnapshot {
            id: self.id.clone(),
            session: session.to_string(),
            server_id: self.scope.server_id.clone(),
            channel_id: self.scope.channel_id.clone(),
            keywords: self.keywords.clone(),
            handler_id: self.handler_id.clone(),
            handler_options: self.handler_options.clone(),
            description: self.description.clone(),
            active: self.active,
            created_at_ms: self.created_at_ms,
        }
    }
}

/// Read-only projection of a listener, tagged with its session's token hint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListenerSnapshot {
    pub id: String,
    pub session: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    pub keywords: Vec<String>,
    pub handler_id: String,
    pub handler_options: HandlerOptions,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub active: bool,
    pub created_at_ms: u64,
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
