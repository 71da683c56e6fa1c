//! Configuration loading
//!
//! Client settings are resolved in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing config file is not an error: the client starts with defaults
//! and logs a warning. A config file that exists but does not parse is.

use crate::models::Identity;
use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Default backend base URL
pub const DEFAULT_API_BASE_URL: &str = "https://projecthub-backend.vercel.app/api";

/// Default per-request timeout in seconds
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

pub const ENV_API_URL: &str = "PHUB_API_URL";
pub const ENV_TOKEN: &str = "PHUB_TOKEN";
pub const ENV_CONFIG: &str = "PHUB_CONFIG";

/// Configuration file contents
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    /// Backend base URL (e.g. `https://host/api`)
    #[serde(default)]
    pub api_base_url: Option<String>,

    /// Per-request timeout in seconds
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,

    /// Token used when the identity provider has no current identity
    #[serde(default)]
    pub api_token: Option<String>,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub identity: IdentityConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (logs to stderr if not specified)
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

fn default_log_level() -> String {
    "info".to_string()
}

/// Identity used by the static identity provider of the command-line client
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IdentityConfig {
    #[serde(default)]
    pub uid: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
}

impl IdentityConfig {
    /// Build an identity when both uid and email are present
    pub fn identity(&self) -> Option<Identity> {
        let uid = self.uid.as_deref().filter(|s| !s.trim().is_empty())?;
        let email = self.email.as_deref().filter(|s| !s.trim().is_empty())?;
        Some(Identity {
            uid: uid.to_string(),
            email: email.to_string(),
            display_name: self.display_name.clone(),
            photo_url: self.photo_url.clone(),
        })
    }

    fn overlay(self, top: IdentityConfig) -> IdentityConfig {
        IdentityConfig {
            uid: top.uid.or(self.uid),
            email: top.email.or(self.email),
            display_name: top.display_name.or(self.display_name),
            photo_url: top.photo_url.or(self.photo_url),
        }
    }
}

/// Values given on the command line
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub config_path: Option<PathBuf>,
    pub api_base_url: Option<String>,
    pub api_token: Option<String>,
    pub identity: IdentityConfig,
}

/// Fully resolved client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub request_timeout: Duration,
    pub api_token: Option<String>,
    pub logging: LoggingConfig,
    pub identity: Option<Identity>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            api_token: None,
            logging: LoggingConfig::default(),
            identity: None,
        }
    }
}

impl ClientConfig {
    /// Resolve configuration from command line, environment, file and defaults
    pub fn load(overrides: ConfigOverrides) -> Result<Self> {
        let toml_config = match config_file_path(overrides.config_path.as_deref()) {
            Some(path) if path.exists() => {
                info!("Loading configuration from {}", path.display());
                load_toml_config(&path)?
            }
            Some(path) => {
                if overrides.config_path.is_some() {
                    return Err(Error::Config(format!(
                        "Config file not found: {}",
                        path.display()
                    )));
                }
                warn!(
                    "Config file {} not found, using defaults",
                    path.display()
                );
                TomlConfig::default()
            }
            None => {
                warn!("Could not determine config directory, using defaults");
                TomlConfig::default()
            }
        };

        Self::resolve(overrides, |key| std::env::var(key).ok(), toml_config)
    }

    /// Merge the sources with an injectable environment lookup
    pub fn resolve<F>(overrides: ConfigOverrides, env: F, toml_config: TomlConfig) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_base_url = overrides
            .api_base_url
            .or_else(|| env(ENV_API_URL))
            .or(toml_config.api_base_url)
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());

        if !(api_base_url.starts_with("http://") || api_base_url.starts_with("https://")) {
            return Err(Error::Config(format!(
                "api_base_url must be an http(s) URL, got '{}'",
                api_base_url
            )));
        }

        let timeout_secs = toml_config
            .request_timeout_secs
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);
        if timeout_secs == 0 {
            return Err(Error::Config(
                "request_timeout_secs must be greater than zero".to_string(),
            ));
        }

        let api_token = overrides
            .api_token
            .or_else(|| env(ENV_TOKEN))
            .or(toml_config.api_token)
            .filter(|t| !t.trim().is_empty());

        let identity = toml_config.identity.overlay(overrides.identity).identity();

        Ok(Self {
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            request_timeout: Duration::from_secs(timeout_secs),
            api_token,
            logging: toml_config.logging,
            identity,
        })
    }
}

/// Config file location: explicit path, then `$PHUB_CONFIG`, then the
/// platform config directory (`<config_dir>/projecthub/config.toml`)
pub fn config_file_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    if let Ok(path) = std::env::var(ENV_CONFIG) {
        return Some(PathBuf::from(path));
    }
    dirs::config_dir().map(|d| d.join("projecthub").join("config.toml"))
}

/// Read and parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)?;
    let config = toml::from_str(&content)?;
    Ok(config)
}
