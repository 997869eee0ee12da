//! Layered client configuration.
//!
//! Every client setting is looked up in order: runtime override, the
//! client's own `[client.<name>]` section, then `[default_client]`. Fields
//! fall back independently, so a client section may override only its host
//! and inherit everything else.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::rounding::{Granularity, InvalidGranularity};

/// Longest lookback accepted, in days.
pub const MAX_PERIOD_DAYS: u32 = 36_500;

/// Configuration errors. All of these are fatal at startup except
/// [`ConfigError::MissingField`], which only affects entries of one client.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A rounding granularity is zero, negative or too large.
    #[error("{key}: {source}")]
    Granularity {
        key: String,
        #[source]
        source: InvalidGranularity,
    },
    /// The lookback period is outside `1..=MAX_PERIOD_DAYS`.
    #[error("period must be between 1 and {max} days, got {0}", max = MAX_PERIOD_DAYS)]
    InvalidPeriod(i64),
    /// Two client sections differ only in letter case.
    #[error("client sections `{first}` and `{second}` name the same client")]
    DuplicateClient { first: String, second: String },
    /// A status tag name is blank.
    #[error("{name} tag name cannot be empty")]
    EmptyTag { name: &'static str },
    /// Two status tags share a name.
    #[error("tag `{tag}` is configured as both the {first} and the {second} tag")]
    DuplicateTag {
        tag: String,
        first: &'static str,
        second: &'static str,
    },
    /// Neither the client section nor the default client sets a field.
    #[error("client.{client}.{field} is not set and default_client.{field} has no fallback")]
    MissingField { client: String, field: ClientField },
}

/// The per-client settings that take part in the fallback cascade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientField {
    Username,
    Secret,
    ActingUser,
    Host,
    Rounding,
}

impl ClientField {
    /// Key of the field inside a client section.
    pub const fn key(self) -> &'static str {
        match self {
            Self::Username => "jira_username",
            Self::Secret => "jira_password",
            Self::ActingUser => "jira_client_user",
            Self::Host => "jira_host",
            Self::Rounding => "rounding_minutes",
        }
    }
}

impl fmt::Display for ClientField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// One `[default_client]` or `[client.<name>]` table. Every field is optional.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jira_username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jira_password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jira_client_user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jira_host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rounding_minutes: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    /// Legacy marker left in generated templates until the user reviews them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_check: Option<String>,
}

impl fmt::Debug for ClientSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientSection")
            .field("jira_username", &self.jira_username)
            .field(
                "jira_password",
                &self.jira_password.as_ref().map(|_| "[REDACTED]"),
            )
            .field("jira_client_user", &self.jira_client_user)
            .field("jira_host", &self.jira_host)
            .field("rounding_minutes", &self.rounding_minutes)
            .field("enabled", &self.enabled)
            .field("config_check", &self.config_check)
            .finish()
    }
}

/// Names of the status tags written back to time entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TagNames {
    pub success: String,
    pub failed: String,
    pub skip: String,
}

impl Default for TagNames {
    fn default() -> Self {
        Self {
            success: "logged".to_string(),
            failed: "jira-migration-failed".to_string(),
            skip: "jira-skip".to_string(),
        }
    }
}

impl TagNames {
    fn validate(&self) -> Result<(), ConfigError> {
        let named = [
            ("success", self.success.as_str()),
            ("failed", self.failed.as_str()),
            ("skip", self.skip.as_str()),
        ];
        for (name, tag) in named {
            if tag.trim().is_empty() {
                return Err(ConfigError::EmptyTag { name });
            }
        }
        for (i, &(first, tag)) in named.iter().enumerate() {
            if let Some(&(second, _)) = named[i + 1..].iter().find(|(_, other)| *other == tag) {
                return Err(ConfigError::DuplicateTag {
                    tag: tag.to_string(),
                    first,
                    second,
                });
            }
        }
        Ok(())
    }
}

/// Validated settings shared by every entry of a run.
#[derive(Debug, Clone)]
pub struct GlobalConfig {
    default_client: ClientSection,
    clients: BTreeMap<String, ClientSection>,
    period_days: u32,
    tags: TagNames,
}

impl GlobalConfig {
    /// Validates and freezes the configuration.
    ///
    /// Client names are matched case-insensitively, so section keys are
    /// stored lower-cased.
    pub fn new(
        default_client: ClientSection,
        clients: BTreeMap<String, ClientSection>,
        period_days: i64,
        tags: TagNames,
    ) -> Result<Self, ConfigError> {
        let period_days = validate_period(period_days)?;
        tags.validate()?;

        validate_rounding("default_client.rounding_minutes", &default_client)?;
        let mut original_names: BTreeMap<String, String> = BTreeMap::new();
        let mut by_key = BTreeMap::new();
        for (name, section) in clients {
            let key = name.to_lowercase();
            if let Some(first) = original_names.get(&key) {
                return Err(ConfigError::DuplicateClient {
                    first: first.clone(),
                    second: name,
                });
            }
            validate_rounding(&format!("client.{key}.rounding_minutes"), &section)?;
            original_names.insert(key.clone(), name);
            by_key.insert(key, section);
        }

        Ok(Self {
            default_client,
            clients: by_key,
            period_days,
            tags,
        })
    }

    pub const fn default_client(&self) -> &ClientSection {
        &self.default_client
    }

    pub fn client_section(&self, client_key: &str) -> Option<&ClientSection> {
        self.clients.get(client_key)
    }

    /// Names of all configured client sections, sorted.
    pub fn client_names(&self) -> impl Iterator<Item = &str> {
        self.clients.keys().map(String::as_str)
    }

    pub const fn period_days(&self) -> u32 {
        self.period_days
    }

    pub const fn tags(&self) -> &TagNames {
        &self.tags
    }
}

/// Values given on the command line for this run only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuntimeOverrides {
    pub period_days: Option<i64>,
    /// Applies to every client, not only the default one.
    pub rounding_minutes: Option<i64>,
}

impl RuntimeOverrides {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(days) = self.period_days {
            validate_period(days)?;
        }
        validate_rounding("--rounding", &self.as_section())
    }

    /// Lookback period in days, preferring the override.
    pub fn effective_period(&self, config: &GlobalConfig) -> u32 {
        self.period_days
            .and_then(|days| validate_period(days).ok())
            .unwrap_or(config.period_days)
    }

    fn as_section(&self) -> ClientSection {
        ClientSection {
            rounding_minutes: self.rounding_minutes,
            ..ClientSection::default()
        }
    }
}

/// Fully resolved settings for one client.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub name: String,
    pub username: String,
    pub secret: String,
    pub acting_user: String,
    pub host: String,
    pub granularity: Granularity,
    pub enabled: bool,
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("name", &self.name)
            .field("username", &self.username)
            .field("secret", &"[REDACTED]")
            .field("acting_user", &self.acting_user)
            .field("host", &self.host)
            .field("granularity", &self.granularity)
            .field("enabled", &self.enabled)
            .finish()
    }
}

/// Why a configured client is not processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisabledReason {
    /// The section still carries the `config_check` marker.
    NeedsReview,
    /// `enabled = false`.
    Disabled,
}

/// Outcome of resolving a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Ready(ClientConfig),
    /// No `[client.<name>]` section exists.
    Unconfigured,
    Disabled(DisabledReason),
}

/// Resolves the settings for `client_key`.
///
/// Returns [`Resolution::Unconfigured`] when the client has no section of
/// its own and [`Resolution::Disabled`] when the section is marked for
/// review or disabled. A field with no value in any layer is an error.
pub fn resolve(
    client_key: &str,
    config: &GlobalConfig,
    overrides: &RuntimeOverrides,
) -> Result<Resolution, ConfigError> {
    let Some(section) = config.client_section(client_key) else {
        return Ok(Resolution::Unconfigured);
    };
    if section.config_check.is_some() {
        return Ok(Resolution::Disabled(DisabledReason::NeedsReview));
    }
    if !is_enabled(section, config) {
        return Ok(Resolution::Disabled(DisabledReason::Disabled));
    }

    resolve_fields(client_key, section, config, overrides).map(Resolution::Ready)
}

/// `enabled` from the client section, then the default client, then `true`.
fn is_enabled(section: &ClientSection, config: &GlobalConfig) -> bool {
    section
        .enabled
        .or(config.default_client.enabled)
        .unwrap_or(true)
}

/// Resolves every field of a client section without checking whether the
/// client is enabled.
pub fn resolve_fields(
    client_key: &str,
    section: &ClientSection,
    config: &GlobalConfig,
    overrides: &RuntimeOverrides,
) -> Result<ClientConfig, ConfigError> {
    let override_section = overrides.as_section();
    let cascade = Cascade {
        client_key,
        layers: [&override_section, section, &config.default_client],
    };

    let minutes = *cascade.lookup(ClientField::Rounding, |s| s.rounding_minutes.as_ref())?;
    let granularity =
        Granularity::from_minutes(minutes).map_err(|source| ConfigError::Granularity {
            key: format!("client.{client_key}.rounding_minutes"),
            source,
        })?;

    Ok(ClientConfig {
        name: client_key.to_string(),
        username: cascade.text(ClientField::Username, |s| &s.jira_username)?,
        secret: cascade.text(ClientField::Secret, |s| &s.jira_password)?,
        acting_user: cascade.text(ClientField::ActingUser, |s| &s.jira_client_user)?,
        host: cascade.text(ClientField::Host, |s| &s.jira_host)?,
        granularity,
        enabled: is_enabled(section, config),
    })
}

/// Ordered lookup over the configuration layers of one client.
struct Cascade<'a> {
    client_key: &'a str,
    layers: [&'a ClientSection; 3],
}

impl<'a> Cascade<'a> {
    /// First layer that sets `field`, highest precedence first.
    fn lookup<T: ?Sized>(
        &self,
        field: ClientField,
        get: impl Fn(&'a ClientSection) -> Option<&'a T>,
    ) -> Result<&'a T, ConfigError> {
        self.layers
            .iter()
            .find_map(|layer| get(*layer))
            .ok_or_else(|| ConfigError::MissingField {
                client: self.client_key.to_string(),
                field,
            })
    }

    /// Like [`Cascade::lookup`], treating blank strings as unset.
    fn text(
        &self,
        field: ClientField,
        get: impl Fn(&'a ClientSection) -> &'a Option<String>,
    ) -> Result<String, ConfigError> {
        self.lookup(field, |layer| {
            get(layer)
                .as_deref()
                .filter(|value| !value.trim().is_empty())
        })
        .map(str::to_string)
    }
}

fn validate_period(days: i64) -> Result<u32, ConfigError> {
    u32::try_from(days)
        .ok()
        .filter(|days| (1..=MAX_PERIOD_DAYS).contains(days))
        .ok_or(ConfigError::InvalidPeriod(days))
}

fn validate_rounding(key: &str, section: &ClientSection) -> Result<(), ConfigError> {
    if let Some(minutes) = section.rounding_minutes {
        Granularity::from_minutes(minutes).map_err(|source| ConfigError::Granularity {
            key: key.to_string(),
            source,
        })?;
    }
    Ok(())
}
