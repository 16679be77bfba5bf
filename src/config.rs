//! Configuration loading from TOML.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Secrets are never stored here; they live in the credential store and
//! are referenced by logical name.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::engine::item_set::FilterPolicy;

// ---------------------------------------------------------------------------
// Limits
// ---------------------------------------------------------------------------

const MIN_PROJECT_NAME_LEN: usize = 4;
const MAX_PROJECT_NAME_LEN: usize = 16;

/// Shortest cooldown accepted between two runs.
pub const MIN_COOLDOWN: Duration = Duration::from_secs(10 * 60);

/// Every 64-bit account id starts with this prefix and has 17 digits.
const ACCOUNT_ID_PREFIX: &str = "7656119";
const ACCOUNT_ID_DIGITS: usize = 17;

// ---------------------------------------------------------------------------
// Config structs
// ---------------------------------------------------------------------------

/// Top-level application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    pub project: ProjectConfig,
    #[serde(default)]
    pub checks: ChecksConfig,
    #[serde(default)]
    pub supplement: SupplementConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub credentials: CredentialsConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub name: String,
    /// Minimum time between two successful runs, e.g. `"1d"`.
    #[serde(with = "crate::duration::as_string")]
    pub cooldown: Duration,
    /// 64-bit account id whose inventory is valued.
    pub account_id: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecksConfig {
    #[serde(default)]
    pub skip_services_check: bool,
    #[serde(default)]
    pub skip_user_check: bool,
    /// Value marketable items even when they cannot currently be traded.
    #[serde(default)]
    pub skip_untradable_filter: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplementConfig {
    /// JSON file with extra items to value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialBackend {
    /// Read-only, from `<PREFIX>_<NAME>` environment variables.
    Env,
    /// JSON file inside the data directory.
    #[default]
    File,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialsConfig {
    #[serde(default)]
    pub backend: CredentialBackend,
    #[serde(default = "default_env_prefix")]
    pub env_prefix: String,
}

fn default_env_prefix() -> String {
    "INVENTORY_VALUER".to_string()
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            backend: CredentialBackend::default(),
            env_prefix: default_env_prefix(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourcesConfig {
    #[serde(default = "default_steam_community_url")]
    pub steam_community_url: String,
    #[serde(default = "default_steam_api_url")]
    pub steam_api_url: String,
    #[serde(default = "default_csfloat_url")]
    pub csfloat_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_steam_community_url() -> String {
    "https://steamcommunity.com".to_string()
}

fn default_steam_api_url() -> String {
    "https://api.steampowered.com".to_string()
}

fn default_csfloat_url() -> String {
    "https://csfloat.com".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            steam_community_url: default_steam_community_url(),
            steam_api_url: default_steam_api_url(),
            csfloat_url: default_csfloat_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid project name '{name}': {reason}")]
    InvalidProjectName { name: String, reason: String },

    #[error("cooldown must be at least {}", crate::duration::format_duration(&MIN_COOLDOWN))]
    CooldownTooShort,

    #[error(
        "account id {0} must be {digits} digits starting with {prefix}",
        digits = ACCOUNT_ID_DIGITS,
        prefix = ACCOUNT_ID_PREFIX
    )]
    InvalidAccountId(u64),

    #[error("supplement file does not exist: {0}")]
    MissingSupplementFile(PathBuf),

    #[error("no changes specified")]
    NoChanges,
}

/// Field overrides applied by `config edit`. `None` leaves a field as is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigEdit {
    pub project_name: Option<String>,
    pub cooldown: Option<Duration>,
    pub account_id: Option<u64>,
    pub supplement: Option<PathBuf>,
    pub clear_supplement: bool,
    pub skip_services_check: Option<bool>,
    pub skip_user_check: Option<bool>,
    pub skip_untradable_filter: Option<bool>,
}

impl ConfigEdit {
    pub fn is_empty(&self) -> bool {
        *self == ConfigEdit::default()
    }
}

/// Whether `id` looks like a 64-bit account id.
pub fn is_valid_account_id(id: u64) -> bool {
    let s = id.to_string();
    s.len() == ACCOUNT_ID_DIGITS && s.starts_with(ACCOUNT_ID_PREFIX)
}

fn validate_project_name(name: &str) -> Result<(), ConfigError> {
    let fail = |reason: String| ConfigError::InvalidProjectName {
        name: name.to_string(),
        reason,
    };

    if name.len() < MIN_PROJECT_NAME_LEN {
        return Err(fail(format!("must be at least {MIN_PROJECT_NAME_LEN} characters long")));
    }
    if name.len() > MAX_PROJECT_NAME_LEN {
        return Err(fail(format!("must be at most {MAX_PROJECT_NAME_LEN} characters long")));
    }
    if let Some(c) = name.chars().find(|c| !c.is_ascii_lowercase()) {
        return Err(fail(format!("may only contain lowercase letters, got '{c}'")));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Loading / saving
// ---------------------------------------------------------------------------

impl AppConfig {
    /// Load and validate configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))?;
        config
            .validate()
            .with_context(|| format!("Invalid config file: {path}"))?;
        Ok(config)
    }

    /// Validate and write the configuration as TOML.
    pub fn save(&self, path: &str) -> Result<()> {
        self.validate().context("Refusing to save invalid config")?;
        let contents = toml::to_string_pretty(self).context("Failed to serialise config")?;
        if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory {}", parent.display()))?;
        }
        fs::write(path, contents).with_context(|| format!("Failed to write config file: {path}"))?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_project_name(&self.project.name)?;

        if self.project.cooldown < MIN_COOLDOWN {
            return Err(ConfigError::CooldownTooShort);
        }

        if !is_valid_account_id(self.project.account_id) {
            return Err(ConfigError::InvalidAccountId(self.project.account_id));
        }

        if let Some(file) = &self.supplement.file {
            if !file.exists() {
                return Err(ConfigError::MissingSupplementFile(file.clone()));
            }
        }

        Ok(())
    }

    /// Copy of this configuration with `edit` applied, validated.
    pub fn edited(&self, edit: &ConfigEdit) -> Result<AppConfig, ConfigError> {
        if edit.is_empty() {
            return Err(ConfigError::NoChanges);
        }

        let mut cfg = self.clone();
        if let Some(name) = &edit.project_name {
            cfg.project.name = name.clone();
        }
        if let Some(cooldown) = edit.cooldown {
            cfg.project.cooldown = cooldown;
        }
        if let Some(id) = edit.account_id {
            cfg.project.account_id = id;
        }
        if edit.clear_supplement {
            cfg.supplement.file = None;
        }
        if let Some(file) = &edit.supplement {
            cfg.supplement.file = Some(file.clone());
        }
        if let Some(skip) = edit.skip_services_check {
            cfg.checks.skip_services_check = skip;
        }
        if let Some(skip) = edit.skip_user_check {
            cfg.checks.skip_user_check = skip;
        }
        if let Some(skip) = edit.skip_untradable_filter {
            cfg.checks.skip_untradable_filter = skip;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    /// Inventory filter selected by the tradable toggle.
    pub fn filter_policy(&self) -> FilterPolicy {
        if self.checks.skip_untradable_filter {
            FilterPolicy::MarketableOnly
        } else {
            FilterPolicy::MarketableAndTradable
        }
    }

    /// Whether any account check needs the platform API key.
    pub fn needs_status_checks(&self) -> bool {
        !self.checks.skip_services_check || !self.checks.skip_user_check
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
