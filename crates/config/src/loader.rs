use std::path::{Path, PathBuf};

use {
    secrecy::Secret,
    tracing::{debug, warn},
};

use crate::{
    env_subst::substitute_env,
    error::{Context, Error, Result},
    schema::ParleyConfig,
};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &["parley.toml", "parley.yaml", "parley.yml", "parley.json"];

/// Environment variable holding the default bot token.
pub const TOKEN_ENV: &str = "DISCORD_TOKEN";
/// Environment variable overriding `logging.level`.
pub const LOG_LEVEL_ENV: &str = "PARLEY_LOG_LEVEL";

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> Result<ParleyConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Load the explicitly given file, or discover one in the standard locations.
///
/// An explicit path that cannot be loaded is an error; discovery falls back to
/// defaults.
pub fn load_or_discover(path: Option<&Path>) -> Result<ParleyConfig> {
    match path {
        Some(path) => load_config(path),
        None => Ok(discover_and_load()),
    }
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./parley.{toml,yaml,yml,json}` (project-local)
/// 2. `~/.config/parley/parley.{toml,yaml,yml,json}` (user-global)
///
/// Returns `ParleyConfig::default()` if no config file is found.
pub fn discover_and_load() -> ParleyConfig {
    if let Some(path) = find_config_file() {
        debug!(path = %path.display(), "loading config");
        match load_config(&path) {
            Ok(cfg) => return cfg,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
            },
        }
    } else {
        debug!("no config file found, using defaults");
    }
    ParleyConfig::default()
}

/// Apply `DISCORD_TOKEN` and `PARLEY_LOG_LEVEL` on top of the file values.
pub fn apply_env_overrides(config: &mut ParleyConfig) {
    apply_env_overrides_with(config, |name| std::env::var(name).ok());
}

fn apply_env_overrides_with(config: &mut ParleyConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(token) = lookup(TOKEN_ENV).filter(|t| !t.trim().is_empty()) {
        debug!("using bot token from {TOKEN_ENV}");
        config.discord.token = Some(Secret::new(token.trim().to_string()));
    }
    if let Some(level) = lookup(LOG_LEVEL_ENV).filter(|l| !l.trim().is_empty()) {
        config.logging.level = level.trim().to_string();
    }
}

/// Find the first config file in standard locations.
fn find_config_file() -> Option<PathBuf> {
    let local = CONFIG_FILENAMES.iter().map(PathBuf::from);
    let global = config_dir()
        .into_iter()
        .flat_map(|dir| CONFIG_FILENAMES.iter().map(move |name| dir.join(name)));
    local.chain(global).find(|p| p.exists())
}

/// Returns the user-global config directory (`~/.config/parley/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "parley").map(|d| d.config_dir().to_path_buf())
}

fn parse_config(raw: &str, path: &Path) -> Result<ParleyConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => toml::from_str(raw).map_err(|e| Error::parse(path, e)),
        "yaml" | "yml" => serde_yaml::from_str(raw).map_err(|e| Error::parse(path, e)),
        "json" => serde_json::from_str(raw).map_err(|e| Error::parse(path, e)),
        _ => Err(Error::message(format!("unsupported config format: .{ext}"))),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, secrecy::ExposeSecret};

    fn write(dir: &tempfile::TempDir, name: &str, body: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn loads_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "parley.toml",
            "[sessions]\nidle_timeout_secs = 5\nsweep_interval_secs = 1\n",
        );
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.sessions.idle_timeout_secs, 5);
        assert_eq!(cfg.sessions.sweep_interval_secs, 1);
    }

    #[test]
    fn loads_yaml_and_json() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = write(&dir, "parley.yaml", "retry:\n  max_attempts: 7\n");
        assert_eq!(load_config(&yaml).unwrap().retry.max_attempts, 7);

        let json = write(&dir, "parley.json", r#"{"logging": {"json": true}}"#);
        assert!(load_config(&json).unwrap().logging.json);
    }

    #[test]
    fn parse_error_names_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "parley.toml", "[sessions\n");
        let err = load_config(&path).unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
        assert!(err.to_string().contains("parley.toml"));
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_or_discover(Some(&dir.path().join("nope.toml"))).unwrap_err();
        assert!(err.to_string().starts_with("failed to read"));
    }

    #[test]
    fn unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "parley.ini", "x=1");
        let err = load_config(&path).unwrap_err();
        assert_eq!(err.to_string(), "unsupported config format: .ini");
    }

    #[test]
    fn env_overrides_replace_file_values() {
        let mut cfg = ParleyConfig::default();
        apply_env_overrides_with(&mut cfg, |name| match name {
            TOKEN_ENV => Some(" env-token ".into()),
            LOG_LEVEL_ENV => Some("trace".into()),
            _ => None,
        });
        assert_eq!(
            cfg.discord.token.as_ref().map(|t| t.expose_secret().as_str()),
            Some("env-token")
        );
        assert_eq!(cfg.logging.level, "trace");
    }

    #[test]
    fn blank_env_values_are_ignored() {
        let mut cfg = ParleyConfig::default();
        apply_env_overrides_with(&mut cfg, |_| Some("   ".into()));
        assert!(cfg.discord.token.is_none());
        assert_eq!(cfg.logging.level, "info");
    }
}
