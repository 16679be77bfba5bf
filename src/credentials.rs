//! Credential store.
//!
//! API keys are looked up by logical name. Two backends exist: process
//! environment variables (read-only) and a JSON file in the data
//! directory. Values are wrapped in [`SecretString`] so they never end up
//! in `Debug` output or logs.

use secrecy::{ExposeSecret, SecretString};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

use crate::storage::write_private;

const CREDENTIALS_FILE: &str = "credentials.json";

/// Logical credential names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CredentialName {
    /// Platform Web API key used by the account checks.
    SteamApiKey,
    /// Price source API key.
    CsFloatApiKey,
}

impl CredentialName {
    pub const ALL: &'static [CredentialName] =
        &[CredentialName::SteamApiKey, CredentialName::CsFloatApiKey];

    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialName::SteamApiKey => "steam_api_key",
            CredentialName::CsFloatApiKey => "csfloat_api_key",
        }
    }
}

impl fmt::Display for CredentialName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CredentialName {
    type Err = CredentialError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_lowercase();
        CredentialName::ALL
            .iter()
            .copied()
            .find(|n| n.as_str() == lower)
            .ok_or_else(|| CredentialError::UnknownName(s.to_string()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("credential not found: {0}")]
    NotFound(CredentialName),

    #[error("unknown credential name '{0}'")]
    UnknownName(String),

    #[error("credential value cannot be empty")]
    EmptyValue,

    #[error("credential backend '{0}' is read-only")]
    ReadOnly(&'static str),

    #[error("credential backend error: {0:#}")]
    Backend(anyhow::Error),
}

/// Load/exists/save contract for opaque API credentials.
pub trait CredentialStore: Send + Sync {
    fn load(&self, name: CredentialName) -> Result<SecretString, CredentialError>;

    fn exists(&self, name: CredentialName) -> Result<bool, CredentialError> {
        match self.load(name) {
            Ok(_) => Ok(true),
            Err(CredentialError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn save(&self, name: CredentialName, value: SecretString) -> Result<(), CredentialError>;

    /// Remove one credential. `Ok(false)` when it was not stored.
    fn delete(&self, name: CredentialName) -> Result<bool, CredentialError>;

    fn delete_all(&self) -> Result<(), CredentialError> {
        for name in CredentialName::ALL {
            self.delete(*name)?;
        }
        Ok(())
    }

    /// Backend name for logging.
    fn backend(&self) -> &'static str;
}

// ---------------------------------------------------------------------------
// Environment backend
// ---------------------------------------------------------------------------

/// Reads `<PREFIX>_<NAME>` variables, e.g. `INVENTORY_VALUER_CSFLOAT_API_KEY`.
pub struct EnvCredentialStore {
    prefix: String,
}

impl EnvCredentialStore {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn var_name(&self, name: CredentialName) -> String {
        format!("{}_{}", self.prefix, name.as_str().to_uppercase())
    }
}

impl CredentialStore for EnvCredentialStore {
    fn load(&self, name: CredentialName) -> Result<SecretString, CredentialError> {
        match std::env::var(self.var_name(name)) {
            Ok(v) if !v.is_empty() => Ok(SecretString::new(v)),
            _ => Err(CredentialError::NotFound(name)),
        }
    }

    fn save(&self, _name: CredentialName, _value: SecretString) -> Result<(), CredentialError> {
        Err(CredentialError::ReadOnly(self.backend()))
    }

    fn delete(&self, _name: CredentialName) -> Result<bool, CredentialError> {
        Err(CredentialError::ReadOnly(self.backend()))
    }

    fn backend(&self) -> &'static str {
        "env"
    }
}

// ---------------------------------------------------------------------------
// File backend
// ---------------------------------------------------------------------------

/// JSON map of logical name to value, replaced atomically on save.
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store located in the configured data directory.
    pub fn in_data_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join(CREDENTIALS_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>, CredentialError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let raw = std::fs::read_to_string(&self.path).map_err(|e| {
            CredentialError::Backend(anyhow::Error::new(e).context(format!(
                "Failed to read credentials from {}",
                self.path.display()
            )))
        })?;
        serde_json::from_str(&raw).map_err(|e| {
            CredentialError::Backend(anyhow::Error::new(e).context(format!(
                "Failed to parse credentials file {}",
                self.path.display()
            )))
        })
    }

    fn write_all(&self, all: &BTreeMap<String, String>) -> Result<(), CredentialError> {
        let json = serde_json::to_vec_pretty(all)
            .map_err(|e| CredentialError::Backend(anyhow::Error::new(e)))?;
        write_private(&self.path, &json).map_err(CredentialError::Backend)
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self, name: CredentialName) -> Result<SecretString, CredentialError> {
        self.read_all()?
            .remove(name.as_str())
            .filter(|v| !v.is_empty())
            .map(SecretString::new)
            .ok_or(CredentialError::NotFound(name))
    }

    fn save(&self, name: CredentialName, value: SecretString) -> Result<(), CredentialError> {
        if value.expose_secret().is_empty() {
            return Err(CredentialError::EmptyValue);
        }

        let mut all = self.read_all()?;
        all.insert(name.as_str().to_string(), value.expose_secret().clone());
        self.write_all(&all)?;

        debug!(name = %name, path = %self.path.display(), "Credential saved");
        Ok(())
    }

    fn delete(&self, name: CredentialName) -> Result<bool, CredentialError> {
        let mut all = self.read_all()?;
        if all.remove(name.as_str()).is_none() {
            return Ok(false);
        }
        self.write_all(&all)?;

        debug!(name = %name, path = %self.path.display(), "Credential deleted");
        Ok(true)
    }

    fn backend(&self) -> &'static str {
        "file"
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
