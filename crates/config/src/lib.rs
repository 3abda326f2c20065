//! Configuration loading, env substitution, env overrides and validation.
//!
//! Config files: `parley.toml`, `parley.yaml` or `parley.json`,
//! searched in `./` then the user config directory (`~/.config/parley/`).
//!
//! Supports `${ENV_VAR}` substitution in all string values. The loaded
//! [`ParleyConfig`] is read once at startup and treated as immutable.

pub mod env_subst;
pub mod error;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    error::{Error, Result},
    loader::{apply_env_overrides, config_dir, discover_and_load, load_config, load_or_discover},
    schema::{DiscordConfig, LoggingConfig, ParleyConfig, RetryConfig, SessionsConfig},
    validate::{Diagnostic, Severity, ValidationResult, validate},
};
