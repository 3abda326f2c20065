//! Config schema types (discord, sessions, retry, logging).

use std::time::Duration;

use {
    parley_common::RetryPolicy,
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

/// Root configuration, read once at startup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ParleyConfig {
    pub discord: DiscordConfig,
    pub sessions: SessionsConfig,
    pub retry: RetryConfig,
    pub logging: LoggingConfig,
}

/// Discord connection settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscordConfig {
    /// Default bot token, used when a tool call carries no credential.
    #[serde(
        serialize_with = "serialize_option_secret",
        skip_serializing_if = "Option::is_none"
    )]
    pub token: Option<Secret<String>>,

    /// Guild that `register_commands` targets when the caller names none.
    /// Commands are registered globally when this is unset as well.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command_guild_id: Option<String>,
}

impl DiscordConfig {
    /// The configured default token, ignoring blank values.
    pub fn default_token(&self) -> Option<&str> {
        self.token
            .as_ref()
            .map(|t| t.expose_secret().trim())
            .filter(|t| !t.is_empty())
    }
}

/// Session pool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionsConfig {
    /// A session unused for longer than this is torn down by the sweeper.
    pub idle_timeout_secs: u64,
    /// How often the idle sweeper runs.
    pub sweep_interval_secs: u64,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: 30 * 60,
            sweep_interval_secs: 60,
        }
    }
}

impl SessionsConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

/// Retry settings for remote platform calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    /// Cap for a single backoff delay. Unset means uncapped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_delay_ms: Option<u64>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1_000,
            max_delay_ms: Some(30_000),
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        let policy = RetryPolicy::new(
            self.max_attempts,
            Duration::from_millis(self.base_delay_ms),
        );
        match self.max_delay_ms {
            Some(ms) => policy.with_max_delay(Duration::from_millis(ms)),
            None => policy,
        }
    }
}

/// Log output settings. CLI flags and `RUST_LOG` take precedence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
        }
    }
}

// ── Serde helpers for Secret<String> ────────────────────────────────────────

fn serialize_option_secret<S: serde::Serializer>(
    secret: &Option<Secret<String>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match secret {
        Some(s) => serializer.serialize_some(s.expose_secret()),
        None => serializer.serialize_none(),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = ParleyConfig::default();
        assert!(cfg.discord.default_token().is_none());
        assert_eq!(cfg.sessions.idle_timeout(), Duration::from_secs(1_800));
        assert_eq!(cfg.sessions.sweep_interval(), Duration::from_secs(60));
        assert_eq!(cfg.retry.max_attempts, 3);
        assert_eq!(cfg.logging.level, "info");
        assert!(!cfg.logging.json);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg: ParleyConfig = toml::from_str(
            r#"
            [discord]
            token = "abc.def.ghi"

            [retry]
            base_delay_ms = 250
            "#,
        )
        .unwrap();
        assert_eq!(cfg.discord.default_token(), Some("abc.def.ghi"));
        assert_eq!(cfg.retry.base_delay_ms, 250);
        assert_eq!(cfg.retry.max_attempts, 3);
        assert_eq!(cfg.sessions.sweep_interval_secs, 60);
    }

    #[test]
    fn blank_token_is_ignored() {
        let cfg: ParleyConfig = serde_json::from_str(r#"{"discord": {"token": "  "}}"#).unwrap();
        assert!(cfg.discord.default_token().is_none());
    }

    #[test]
    fn retry_policy_conversion() {
        let cfg = RetryConfig {
            max_attempts: 5,
            base_delay_ms: 200,
            max_delay_ms: Some(1_000),
        };
        let policy = cfg.policy();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.delay_for(1), Duration::from_millis(400));
        assert_eq!(policy.delay_for(5), Duration::from_millis(1_000));

        let uncapped = RetryConfig {
            max_delay_ms: None,
            ..cfg
        };
        assert_eq!(uncapped.policy().max_delay, None);
    }

    #[test]
    fn debug_output_redacts_token() {
        let cfg: ParleyConfig =
            serde_json::from_str(r#"{"discord": {"token": "super-secret-token"}}"#).unwrap();
        let rendered = format!("{cfg:?}");
        assert!(!rendered.contains("super-secret-token"));
    }
}
