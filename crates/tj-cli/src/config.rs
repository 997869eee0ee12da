//! Configuration loading and management.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use tj_core::{ClientSection, ConfigError, GlobalConfig, TagNames};

/// Application configuration as read from disk and the environment.
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// Toggl API token. `FILL_IT` marks an unfilled template.
    pub toggl_token: Option<String>,
    /// Toggl API root.
    pub toggl_api_url: String,
    /// Lookback window in days.
    pub period: i64,
    #[serde(default)]
    pub tags: TagNames,
    /// Fallback values for every client.
    #[serde(default)]
    pub default_client: ClientSection,
    /// Per-client sections keyed by client name.
    #[serde(default)]
    pub client: BTreeMap<String, ClientSection>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field(
                "toggl_token",
                &self.toggl_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("toggl_api_url", &self.toggl_api_url)
            .field("period", &self.period)
            .field("tags", &self.tags)
            .field("default_client", &self.default_client)
            .field("client", &self.client)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            toggl_token: None,
            toggl_api_url: tj_toggl::DEFAULT_BASE_URL.to_string(),
            period: 1,
            tags: TagNames::default(),
            default_client: ClientSection {
                rounding_minutes: Some(1),
                ..ClientSection::default()
            },
            client: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Load from default config location
        if let Some(path) = default_path() {
            figment = figment.merge(Toml::file(path));
        }

        // Load from specified config file
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // Load from environment variables (TJ_*), `__` nests
        figment = figment.merge(Env::prefixed("TJ_").split("__"));

        figment.extract()
    }

    /// Validates the settings the reconciliation loop runs with.
    pub fn global(&self) -> Result<GlobalConfig, ConfigError> {
        GlobalConfig::new(
            self.default_client.clone(),
            self.client.clone(),
            self.period,
            self.tags.clone(),
        )
    }
}

/// The file bootstrap writes to: `--config` if given, else the platform
/// default.
pub fn resolve_path(config_path: Option<&Path>) -> Result<PathBuf> {
    match config_path {
        Some(path) => Ok(path.to_path_buf()),
        None => default_path().context("could not determine the platform config directory"),
    }
}

/// `~/.config/tj/config.toml` on Linux.
fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("tj").join("config.toml"))
}
