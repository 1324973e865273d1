//! Bootstrap configuration loading and config file resolution
//!
//! Missing configuration never prevents startup: a missing file logs a
//! warning and falls back to compiled defaults. A file that exists but does
//! not parse is an error, since silently ignoring it would hide typos.
//!
//! Config file resolution priority:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. Per-user config directory (`<config_dir>/onair/config.toml`)
//! 4. None (compiled defaults)

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "ONAIR_CONFIG";

/// Stream URL used when neither the config file nor the remote config
/// collaborator supplies one
pub const DEFAULT_STREAM_URL: &str = "https://radio.example.org/live.mp3";

/// Default HTTP control port
pub const DEFAULT_PORT: u16 = 5780;

/// Compiled-in defaults
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub stream_url: String,
    pub port: u16,
    pub log_level: String,
}

impl Default for CompiledDefaults {
    fn default() -> Self {
        Self {
            stream_url: DEFAULT_STREAM_URL.to_string(),
            port: DEFAULT_PORT,
            log_level: default_log_level(),
        }
    }
}

/// Bootstrap configuration loaded from TOML
///
/// Every field is optional in the file; absent fields take compiled defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    /// HTTP control port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Stream URL override (remote config may still replace it at startup)
    #[serde(default)]
    pub stream_url: Option<String>,

    /// Remote key-value endpoint that may supply the stream URL
    #[serde(default)]
    pub remote_config_url: Option<String>,

    /// Analytics endpoint for telemetry events (logs only when absent)
    #[serde(default)]
    pub telemetry_url: Option<String>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            stream_url: None,
            remote_config_url: None,
            telemetry_url: None,
            logging: LoggingConfig::default(),
        }
    }
}

impl TomlConfig {
    /// Stream URL from the file, or the compiled-in default
    pub fn stream_url_or_default(&self) -> String {
        self.stream_url
            .clone()
            .unwrap_or_else(|| CompiledDefaults::default().stream_url)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Resolves which config file (if any) should be read
pub struct ConfigFileResolver {
    env_var_name: String,
}

impl ConfigFileResolver {
    pub fn new() -> Self {
        Self::with_env_var(CONFIG_ENV_VAR)
    }

    /// Use a custom environment variable (tests use this to avoid clobbering
    /// the real one)
    pub fn with_env_var(env_var_name: &str) -> Self {
        Self {
            env_var_name: env_var_name.to_string(),
        }
    }

    /// Resolve the config path following the priority order above
    pub fn resolve(&self, cli_arg: Option<&Path>) -> Option<PathBuf> {
        // Priority 1: Command-line argument
        if let Some(path) = cli_arg {
            return Some(path.to_path_buf());
        }

        // Priority 2: Environment variable
        if let Ok(path) = std::env::var(&self.env_var_name) {
            if !path.is_empty() {
                return Some(PathBuf::from(path));
            }
        }

        // Priority 3: per-user config directory, only if the file exists
        dirs::config_dir()
            .map(|d| d.join("onair").join("config.toml"))
            .filter(|p| p.exists())
    }
}

impl Default for ConfigFileResolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Load a TOML file into `T`, falling back to `T::default()` when the file is
/// absent
pub fn load_or_default<T>(path: Option<&Path>) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    let Some(path) = path else {
        info!("No config file specified, using compiled defaults");
        return Ok(T::default());
    };

    if !path.exists() {
        warn!(
            "Config file {} not found, using compiled defaults",
            path.display()
        );
        return Ok(T::default());
    }

    let content = std::fs::read_to_string(path)?;
    let config = toml::from_str::<T>(&content).map_err(|e| {
        Error::Config(format!("Failed to parse {}: {}", path.display(), e))
    })?;
    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toml_config_defaults() {
        let config: TomlConfig = toml::from_str("").unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
        assert!(config.stream_url.is_none());
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.stream_url_or_default(), DEFAULT_STREAM_URL);
    }

    #[test]
    fn test_toml_config_overrides() {
        let config: TomlConfig = toml::from_str(
            r#"
            port = 9000
            stream_url = "http://localhost:8000/live"

            [logging]
            level = "debug"
            "#,
        )
        .unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.stream_url_or_default(), "http://localhost:8000/live");
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_load_or_default_without_path() {
        let config: TomlConfig = load_or_default(None).unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
    }

    #[test]
    fn test_cli_arg_wins() {
        let resolver = ConfigFileResolver::with_env_var("ONAIR_TEST_UNUSED_VAR");
        let path = PathBuf::from("/tmp/explicit.toml");
        assert_eq!(resolver.resolve(Some(&path)), Some(path));
    }
}
