//! Semantic validation of a loaded [`ParleyConfig`].

use crate::schema::ParleyConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Dotted path, e.g. "sessions.sweep_interval_secs"
    pub path: &'static str,
    pub message: String,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}: {}", self.severity, self.path, self.message)
    }
}

/// Result of validating a configuration.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    fn push(&mut self, severity: Severity, path: &'static str, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic {
            severity,
            path,
            message: message.into(),
        });
    }
}

/// Check values that deserialize fine but cannot work at runtime.
pub fn validate(config: &ParleyConfig) -> ValidationResult {
    let mut result = ValidationResult::default();

    if config.discord.default_token().is_none() {
        result.push(
            Severity::Warning,
            "discord.token",
            "no default token; every tool call must pass a credential",
        );
    } else if config
        .discord
        .default_token()
        .is_some_and(|t| t.starts_with("${"))
    {
        result.push(
            Severity::Error,
            "discord.token",
            "token placeholder was not substituted; is the variable exported?",
        );
    }

    if config
        .discord
        .command_guild_id
        .as_deref()
        .is_some_and(|id| id.parse::<u64>().map_or(true, |v| v == 0))
    {
        result.push(
            Severity::Error,
            "discord.command_guild_id",
            "must be a numeric guild ID",
        );
    }

    if config.sessions.sweep_interval_secs == 0 {
        result.push(
            Severity::Error,
            "sessions.sweep_interval_secs",
            "must be greater than zero",
        );
    }
    if config.sessions.idle_timeout_secs == 0 {
        result.push(
            Severity::Error,
            "sessions.idle_timeout_secs",
            "must be greater than zero",
        );
    } else if config.sessions.idle_timeout_secs < config.sessions.sweep_interval_secs {
        result.push(
            Severity::Warning,
            "sessions.idle_timeout_secs",
            "shorter than the sweep interval; sessions may live up to one interval longer",
        );
    }

    if config.retry.max_attempts == 0 {
        result.push(
            Severity::Error,
            "retry.max_attempts",
            "must be at least 1",
        );
    }
    if let Some(max) = config.retry.max_delay_ms
        && max < config.retry.base_delay_ms
    {
        result.push(
            Severity::Warning,
            "retry.max_delay_ms",
            "smaller than base_delay_ms; every retry waits max_delay_ms",
        );
    }

    if !LOG_LEVELS.contains(&config.logging.level.to_ascii_lowercase().as_str()) {
        result.push(
            Severity::Warning,
            "logging.level",
            format!(
                "unknown level '{}', expected one of {}",
                config.logging.level,
                LOG_LEVELS.join(", ")
            ),
        );
    }

    result
}
