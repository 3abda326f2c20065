use std::{error::Error as StdError, fmt};

use serde::Serialize;

/// Crate-wide result type for chat operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Kind of remote resource a lookup was about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Server,
    Channel,
}

impl ResourceKind {
    fn plural(self) -> &'static str {
        match self {
            Self::Server => "servers",
            Self::Channel => "channels",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Server => f.write_str("server"),
            Self::Channel => f.write_str("channel"),
        }
    }
}

/// One of several resources a query could refer to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Candidate {
    pub id: String,
    pub name: String,
    /// Category (for channels) the candidate lives under, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.parent {
            Some(parent) => write!(f, "{} (ID: {}, in {})", self.name, self.id, parent),
            None => write!(f, "{} (ID: {})", self.name, self.id),
        }
    }
}

/// Error taxonomy for everything that talks to the chat platform.
///
/// Only [`Error::Transient`] is retried; lookup failures are deterministic and
/// carry the valid alternatives so callers can correct themselves.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The credential was rejected. Carries only the credential hint.
    #[error("authentication failed for token {credential}: {reason}")]
    AuthenticationFailed { credential: String, reason: String },

    /// No resource matched the query.
    #[error("{}", describe_not_found(*kind, query, scope.as_deref(), available))]
    ScopeNotFound {
        kind: ResourceKind,
        query: String,
        /// Server the channel search was restricted to.
        scope: Option<String>,
        available: Vec<String>,
    },

    /// More than one resource matched, or a required scope was omitted.
    #[error("{}", describe_ambiguous(*kind, query.as_deref(), candidates))]
    AmbiguousScope {
        kind: ResourceKind,
        query: Option<String>,
        candidates: Vec<Candidate>,
    },

    /// Network, gateway, rate-limit or 5xx class failure.
    #[error("{context}: {source}")]
    Transient {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    /// The platform refused the request (missing permission, bad payload).
    #[error("{context}: {message}")]
    Rejected { context: String, message: String },

    /// Input payload or parameter is invalid.
    #[error("invalid input: {message}")]
    InvalidInput { message: String },

    /// A listener references a handler that is not registered.
    #[error("no response handler registered with id '{handler_id}'")]
    HandlerNotFound { handler_id: String },

    /// A response handler returned an error.
    #[error("handler '{handler_id}' failed: {source}")]
    HandlerInvocationFailed {
        handler_id: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    /// The session was torn down while the operation was in flight.
    #[error("session for token {credential} is closed")]
    SessionClosed { credential: String },
}

impl Error {
    #[must_use]
    pub fn invalid_input(message: impl fmt::Display) -> Self {
        Self::InvalidInput {
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn transient(
        context: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::Transient {
            context: context.into(),
            source: Box::new(source),
        }
    }

    #[must_use]
    pub fn rejected(context: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Rejected {
            context: context.into(),
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn handler_failed(
        handler_id: impl Into<String>,
        source: impl Into<Box<dyn StdError + Send + Sync>>,
    ) -> Self {
        Self::HandlerInvocationFailed {
            handler_id: handler_id.into(),
            source: source.into(),
        }
    }

    /// Whether repeating the same call may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    /// Whether the message is meant for the caller as-is.
    ///
    /// Handler failures carry handler internals: they are logged in full and
    /// surfaced only as a short reason.
    #[must_use]
    pub fn is_user_facing(&self) -> bool {
        !matches!(self, Self::HandlerInvocationFailed { .. })
    }

    /// Stable machine-readable kind, used for logs and metrics labels.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AuthenticationFailed { .. } => "authentication_failed",
            Self::ScopeNotFound { .. } => "scope_not_found",
            Self::AmbiguousScope { .. } => "ambiguous_scope",
            Self::Transient { .. } => "transient_remote_failure",
            Self::Rejected { .. } => "rejected",
            Self::InvalidInput { .. } => "invalid_input",
            Self::HandlerNotFound { .. } => "handler_not_found",
            Self::HandlerInvocationFailed { .. } => "handler_invocation_failed",
            Self::SessionClosed { .. } => "session_closed",
        }
    }
}

fn describe_not_found(
    kind: ResourceKind,
    query: &str,
    scope: Option<&str>,
    available: &[String],
) -> String {
    if query.is_empty() {
        return format!("Bot is not in any {}.", kind.plural());
    }
    let mut out = match (kind, scope) {
        (ResourceKind::Channel, Some(scope)) => {
            format!("Channel \"{query}\" not found in server \"{scope}\".")
        },
        _ => format!("{} \"{query}\" not found.", capitalize(kind)),
    };
    if available.is_empty() {
        out.push_str(&format!(" No {} are available.", kind.plural()));
    } else {
        out.push_str(&format!(
            " Available {}: {}",
            kind.plural(),
            available.join(", ")
        ));
    }
    out
}

fn describe_ambiguous(kind: ResourceKind, query: Option<&str>, candidates: &[Candidate]) -> String {
    let listed = candidates
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    match query {
        Some(query) => format!(
            "Multiple {} named \"{query}\" found; specify the ID instead: {listed}",
            kind.plural()
        ),
        None => format!(
            "Bot is in multiple {}; specify one by name or ID. Available {}: {listed}",
            kind.plural(),
            kind.plural()
        ),
    }
}

fn capitalize(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::Server => "Server",
        ResourceKind::Channel => "Channel",
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: &str, name: &str, parent: Option<&str>) -> Candidate {
        Candidate {
            id: id.into(),
            name: name.into(),
            parent: parent.map(Into::into),
        }
    }

    #[test]
    fn only_transient_errors_retry() {
        let transient = Error::transient(
            "fetch guilds",
            std::io::Error::new(std::io::ErrorKind::TimedOut, "timed out"),
        );
        assert!(transient.is_retryable());
        assert_eq!(transient.kind(), "transient_remote_failure");

        let not_found = Error::ScopeNotFound {
            kind: ResourceKind::Server,
            query: "x".into(),
            scope: None,
            available: vec![],
        };
        assert!(!not_found.is_retryable());
        assert!(!Error::invalid_input("bad").is_retryable());
    }

    #[test]
    fn not_found_lists_alternatives() {
        let err = Error::ScopeNotFound {
            kind: ResourceKind::Channel,
            query: "genral".into(),
            scope: Some("Rust Hub".into()),
            available: vec!["general".into(), "random".into()],
        };
        assert_eq!(
            err.to_string(),
            "Channel \"genral\" not found in server \"Rust Hub\". Available channels: general, random"
        );
    }

    #[test]
    fn not_found_without_alternatives() {
        let err = Error::ScopeNotFound {
            kind: ResourceKind::Server,
            query: "home".into(),
            scope: None,
            available: vec![],
        };
        assert_eq!(
            err.to_string(),
            "Server \"home\" not found. No servers are available."
        );
    }

    #[test]
    fn not_found_without_query() {
        let err = Error::ScopeNotFound {
            kind: ResourceKind::Server,
            query: String::new(),
            scope: None,
            available: vec![],
        };
        assert_eq!(err.to_string(), "Bot is not in any servers.");
    }

    #[test]
    fn ambiguous_lists_ids() {
        let err = Error::AmbiguousScope {
            kind: ResourceKind::Channel,
            query: Some("general".into()),
            candidates: vec![
                candidate("11", "general", Some("Text")),
                candidate("12", "general", None),
            ],
        };
        assert_eq!(
            err.to_string(),
            "Multiple channels named \"general\" found; specify the ID instead: \
             general (ID: 11, in Text), general (ID: 12)"
        );
    }

    #[test]
    fn ambiguous_without_query_asks_for_scope() {
        let err = Error::AmbiguousScope {
            kind: ResourceKind::Server,
            query: None,
            candidates: vec![candidate("1", "A", None), candidate("2", "B", None)],
        };
        assert!(
            err.to_string()
                .starts_with("Bot is in multiple servers; specify one by name or ID.")
        );
    }

    #[test]
    fn internal_errors_are_not_user_facing() {
        let failed = Error::handler_failed("reply", "missing option `message`");
        assert!(!failed.is_user_facing());
        assert!(Error::SessionClosed { credential: "…1234".into() }.is_user_facing());
        assert!(Error::invalid_input("limit out of range").is_user_facing());
    }
}
