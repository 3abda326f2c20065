//! Resource resolution: turn a server/channel name or ID into exactly one
//! remote resource, or a descriptive failure listing the alternatives.
//!
//! Direct ID lookup is tried first for well-formed snowflakes, then a
//! case-insensitive exact name match. Each lookup runs under the retry
//! policy, but only transient failures are repeated: "not found" and
//! "ambiguous" are deterministic outcomes.

use std::collections::HashMap;

use {parley_common::RetryPolicy, serde::Serialize, tracing::warn};

use crate::{
    Error, Result,
    connection::ChatConnection,
    error::{Candidate, ResourceKind},
    types::{ChannelKind, ChannelSummary, GuildSummary},
};

/// Which channel kinds a lookup may return.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChannelFilter {
    /// Channels that can carry messages.
    #[default]
    TextCapable,
    Any,
}

impl ChannelFilter {
    pub fn admits(self, kind: ChannelKind) -> bool {
        match self {
            Self::TextCapable => kind.is_text_capable(),
            Self::Any => true,
        }
    }
}

/// A channel together with the server it was resolved in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedChannel {
    pub guild: GuildSummary,
    pub channel: ChannelSummary,
}

/// Name/ID resolver bound to a retry policy.
#[derive(Debug, Clone, Default)]
pub struct Resolver {
    policy: RetryPolicy,
}

impl Resolver {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Resolve a server. With no query the bot must be in exactly one server.
    pub async fn resolve_guild(
        &self,
        conn: &dyn ChatConnection,
        query: Option<&str>,
    ) -> Result<GuildSummary> {
        self.policy
            .execute_when(
                || find_guild(conn, query),
                Error::is_retryable,
                |retry| {
                    warn!(
                        attempt = retry.attempt,
                        max_attempts = retry.max_attempts,
                        delay_ms = retry.delay.as_millis() as u64,
                        error = %retry.error,
                        "server lookup failed, retrying"
                    );
                },
            )
            .await
    }

    /// Resolve a channel, scoped to `guild` (or the only server the bot is in).
    pub async fn resolve_channel(
        &self,
        conn: &dyn ChatConnection,
        channel: &str,
        guild: Option<&str>,
        filter: ChannelFilter,
    ) -> Result<ResolvedChannel> {
        self.policy
            .execute_when(
                || find_channel(conn, channel, guild, filter),
                Error::is_retryable,
                |retry| {
                    warn!(
                        attempt = retry.attempt,
                        max_attempts = retry.max_attempts,
                        delay_ms = retry.delay.as_millis() as u64,
                        error = %retry.error,
                        "channel lookup failed, retrying"
                    );
                },
            )
            .await
    }
}

/// Discord IDs are non-zero 64-bit integers.
pub fn is_snowflake(value: &str) -> bool {
    !value.is_empty()
        && value.bytes().all(|b| b.is_ascii_digit())
        && value.parse::<u64>().is_ok_and(|id| id != 0)
}

/// Strip `#name` and `<#id>` decorations.
fn normalize_channel_query(raw: &str) -> &str {
    let trimmed = raw.trim();
    if let Some(inner) = trimmed
        .strip_prefix("<#")
        .and_then(|rest| rest.strip_suffix('>'))
    {
        return inner.trim();
    }
    trimmed.trim_start_matches('#').trim()
}

fn same_name(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

async fn find_guild(conn: &dyn ChatConnection, query: Option<&str>) -> Result<GuildSummary> {
    let query = query.map(str::trim).filter(|q| !q.is_empty());

    let Some(query) = query else {
        let mut guilds = conn.guilds().await?;
        return match guilds.len() {
            0 => Err(Error::ScopeNotFound {
                kind: ResourceKind::Server,
                query: String::new(),
                scope: None,
                available: Vec::new(),
            }),
            1 => Ok(guilds.remove(0)),
            _ => Err(Error::AmbiguousScope {
                kind: ResourceKind::Server,
                query: None,
                candidates: guilds.into_iter().map(guild_candidate).collect(),
            }),
        };
    };

    if is_snowflake(query)
        && let Some(guild) = conn.guild(query).await?
    {
        return Ok(guild);
    }

    let guilds = conn.guilds().await?;
    let mut matches: Vec<GuildSummary> = guilds
        .iter()
        .filter(|g| same_name(&g.name, query))
        .cloned()
        .collect();

    match matches.len() {
        0 => Err(Error::ScopeNotFound {
            kind: ResourceKind::Server,
            query: query.to_string(),
            scope: None,
            available: guilds.into_iter().map(|g| g.name).collect(),
        }),
        1 => Ok(matches.remove(0)),
        _ => Err(Error::AmbiguousScope {
            kind: ResourceKind::Server,
            query: Some(query.to_string()),
            candidates: matches.into_iter().map(guild_candidate).collect(),
        }),
    }
}

async fn find_channel(
    conn: &dyn ChatConnection,
    raw: &str,
    guild_query: Option<&str>,
    filter: ChannelFilter,
) -> Result<ResolvedChannel> {
    let query = normalize_channel_query(raw);
    if query.is_empty() {
        return Err(Error::invalid_input("channel name or ID must not be empty"));
    }

    let guild = find_guild(conn, guild_query).await?;

    if is_snowflake(query)
        && let Some(channel) = conn.channel(query).await?
        && channel.guild_id == guild.id
    {
        if !filter.admits(channel.kind) {
            return Err(Error::invalid_input(format!(
                "channel \"{}\" is a {} channel and cannot be used for messages",
                channel.name, channel.kind
            )));
        }
        return Ok(ResolvedChannel { guild, channel });
    }

    let channels = conn.channels(&guild.id).await?;
    let categories: HashMap<&str, &str> = channels
        .iter()
        .filter(|c| c.kind == ChannelKind::Category)
        .map(|c| (c.id.as_str(), c.name.as_str()))
        .collect();

    let eligible: Vec<&ChannelSummary> = channels.iter().filter(|c| filter.admits(c.kind)).collect();
    let matches: Vec<&ChannelSummary> = eligible
        .iter()
        .copied()
        .filter(|c| same_name(&c.name, query))
        .collect();

    match matches.as_slice() {
        [] => Err(Error::ScopeNotFound {
            kind: ResourceKind::Channel,
            query: query.to_string(),
            scope: Some(guild.name.clone()),
            available: eligible.iter().map(|c| c.name.clone()).collect(),
        }),
        [only] => {
            let channel = (*only).clone();
            Ok(ResolvedChannel { guild, channel })
        },
        many => Err(Error::AmbiguousScope {
            kind: ResourceKind::Channel,
            query: Some(query.to_string()),
            candidates: many
                .iter()
                .map(|c| Candidate {
                    id: c.id.clone(),
                    name: c.name.clone(),
                    parent: c
                        .parent_id
                        .as_deref()
                        .and_then(|p| categories.get(p))
                        .map(|name| (*name).to_string()),
                })
                .collect(),
        }),
    }
}

fn guild_candidate(guild: GuildSummary) -> Candidate {
    Candidate {
        id: guild.id,
        name: guild.name,
        parent: None,
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::testing::FakeConnection,
        rstest::rstest,
        std::time::Duration,
    };

    fn resolver() -> Resolver {
        Resolver::new(RetryPolicy::new(3, Duration::from_millis(10)))
    }

    fn hub() -> FakeConnection {
        FakeConnection::new()
            .with_guild("1000", "Rust Hub")
            .with_channel("1000", "2000", "Text Channels", ChannelKind::Category, None)
            .with_channel("1000", "3000", "Archive", ChannelKind::Category, None)
            .with_channel("1000", "2001", "general", ChannelKind::Text, Some("2000"))
            .with_channel("1000", "3001", "general", ChannelKind::Text, Some("3000"))
            .with_channel("1000", "2002", "random", ChannelKind::Text, Some("2000"))
            .with_channel("1000", "2003", "lounge", ChannelKind::Voice, Some("2000"))
    }

    #[tokio::test]
    async fn duplicate_channel_names_are_ambiguous_but_ids_resolve() {
        let conn = hub();
        let err = resolver()
            .resolve_channel(&conn, "general", None, ChannelFilter::TextCapable)
            .await
            .unwrap_err();
        match &err {
            Error::AmbiguousScope { candidates, .. } => {
                let ids: Vec<_> = candidates.iter().map(|c| c.id.as_str()).collect();
                assert_eq!(ids, vec!["2001", "3001"]);
                assert_eq!(candidates[1].parent.as_deref(), Some("Archive"));
            },
            other => panic!("expected ambiguity, got {other:?}"),
        }
        let text = err.to_string();
        assert!(text.contains("2001") && text.contains("3001"));

        let resolved = resolver()
            .resolve_channel(&conn, "3001", None, ChannelFilter::TextCapable)
            .await
            .unwrap();
        assert_eq!(resolved.channel.id, "3001");
        assert_eq!(resolved.guild.name, "Rust Hub");
    }

    #[rstest]
    #[case("random")]
    #[case("#random")]
    #[case("RANDOM")]
    #[case("<#2002>")]
    #[case(" 2002 ")]
    #[tokio::test]
    async fn channel_queries_are_normalized(#[case] query: &str) {
        let conn = hub();
        let resolved = resolver()
            .resolve_channel(&conn, query, Some("rust hub"), ChannelFilter::TextCapable)
            .await
            .unwrap();
        assert_eq!(resolved.channel.id, "2002");
    }

    #[tokio::test]
    async fn missing_channel_lists_text_channels() {
        let conn = hub();
        let err = resolver()
            .resolve_channel(&conn, "lounge", None, ChannelFilter::TextCapable)
            .await
            .unwrap_err();
        match err {
            Error::ScopeNotFound {
                kind,
                scope,
                available,
                ..
            } => {
                assert_eq!(kind, ResourceKind::Channel);
                assert_eq!(scope.as_deref(), Some("Rust Hub"));
                assert_eq!(available, vec!["general", "general", "random"]);
            },
            other => panic!("expected not found, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn voice_channel_by_id_is_rejected_for_text() {
        let conn = hub();
        let err = resolver()
            .resolve_channel(&conn, "2003", None, ChannelFilter::TextCapable)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput { .. }));

        let any = resolver()
            .resolve_channel(&conn, "lounge", None, ChannelFilter::Any)
            .await
            .unwrap();
        assert_eq!(any.channel.kind, ChannelKind::Voice);
    }

    #[tokio::test]
    async fn channel_id_from_another_server_is_not_accepted() {
        let conn = hub()
            .with_guild("5000", "Other")
            .with_text_channel("5000", "5001", "elsewhere");
        let err = resolver()
            .resolve_channel(&conn, "5001", Some("1000"), ChannelFilter::TextCapable)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ScopeNotFound { .. }));
    }

    #[tokio::test]
    async fn omitted_scope_depends_on_server_count() {
        let none = FakeConnection::new();
        let err = resolver().resolve_guild(&none, None).await.unwrap_err();
        assert!(matches!(err, Error::ScopeNotFound { .. }));

        let one = FakeConnection::new().with_guild("1", "Solo");
        assert_eq!(resolver().resolve_guild(&one, None).await.unwrap().id, "1");

        let two = FakeConnection::new()
            .with_guild("1", "A")
            .with_guild("2", "B");
        let err = resolver().resolve_guild(&two, None).await.unwrap_err();
        match err {
            Error::AmbiguousScope {
                query, candidates, ..
            } => {
                assert!(query.is_none());
                assert_eq!(candidates.len(), 2);
            },
            other => panic!("expected ambiguity, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn guilds_resolve_by_id_then_name() {
        let conn = FakeConnection::new()
            .with_guild("11", "Alpha")
            .with_guild("12", "alpha")
            .with_guild("13", "Beta");
        let r = resolver();
        assert_eq!(r.resolve_guild(&conn, Some("12")).await.unwrap().name, "alpha");
        assert_eq!(r.resolve_guild(&conn, Some("beta")).await.unwrap().id, "13");

        let err = r.resolve_guild(&conn, Some("ALPHA")).await.unwrap_err();
        assert!(matches!(err, Error::AmbiguousScope { .. }));

        let err = r.resolve_guild(&conn, Some("Gamma")).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Server \"Gamma\" not found. Available servers: Alpha, alpha, Beta"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_are_retried() {
        let conn = FakeConnection::new().with_guild("1", "Solo");
        conn.fail_next(2);
        let guild = resolver().resolve_guild(&conn, None).await.unwrap();
        assert_eq!(guild.id, "1");
        assert_eq!(conn.remote_calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_surface_after_budget() {
        let conn = FakeConnection::new().with_guild("1", "Solo");
        conn.fail_next(5);
        let err = resolver().resolve_guild(&conn, None).await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(conn.remote_calls(), 3);
    }

    #[tokio::test]
    async fn deterministic_failures_are_not_retried() {
        let conn = FakeConnection::new().with_guild("1", "Solo");
        let err = resolver()
            .resolve_guild(&conn, Some("missing"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ScopeNotFound { .. }));
        assert_eq!(conn.remote_calls(), 1);
    }

    #[rstest]
    #[case("123456789012345678", true)]
    #[case("0", false)]
    #[case("", false)]
    #[case("12a", false)]
    #[case("-5", false)]
    #[case("99999999999999999999999", false)]
    fn snowflake_shape(#[case] value: &str, #[case] expected: bool) {
        assert_eq!(is_snowflake(value), expected);
    }
}
