use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use vcstore_vault::KeyHierarchy;

use crate::error::{RootError, RootResult};
use crate::executor::DEFAULT_MAX_CONCURRENCY;
use crate::query::IssuerPolicy;

/// Environment variable holding the hex-encoded 32-byte root key for
/// encrypted mode. The key is never read from or written to the config file.
pub const ROOT_KEY_ENV: &str = "VCSTORE_ROOT_KEY";

/// How documents are persisted.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageMode {
    #[default]
    Plaintext,
    /// Sealed payload plus blind index entries.
    Encrypted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database file.
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,

    #[serde(default)]
    pub mode: StorageMode,
}

fn default_storage_path() -> PathBuf {
    dirs_or_default(".vcstore/credentials.db")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
            mode: StorageMode::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingConfig {
    /// Sub-queries allowed in flight per `match` call.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    #[serde(default)]
    pub issuer_policy: IssuerPolicy,
}

fn default_max_concurrency() -> usize {
    DEFAULT_MAX_CONCURRENCY
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            issuer_policy: IssuerPolicy::default(),
        }
    }
}

/// Top-level configuration, loaded from TOML (typically
/// `~/.vcstore/config.toml`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryConfig {
    /// Profile scope every stored document and query is bound to.
    #[serde(default = "default_profile_id")]
    pub profile_id: String,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub matching: MatchingConfig,
}

fn default_profile_id() -> String {
    "urn:profile:default".to_string()
}

/// Returns `$HOME/<suffix>` if HOME is available, otherwise `./<suffix>`.
fn dirs_or_default(suffix: &str) -> PathBuf {
    std::env::var("HOME")
        .map(|h| PathBuf::from(h).join(suffix))
        .unwrap_or_else(|_| PathBuf::from(suffix))
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            profile_id: default_profile_id(),
            storage: StorageConfig::default(),
            matching: MatchingConfig::default(),
        }
    }
}

impl RepositoryConfig {
    /// Load configuration from a TOML file. If the file does not exist,
    /// returns a default configuration.
    pub fn load(path: &Path) -> RootResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        let config: RepositoryConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> RootResult<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| RootError::Config(format!("TOML serialize error: {}", e)))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn validate(&self) -> RootResult<()> {
        if self.profile_id.trim().is_empty() {
            return Err(RootError::Config("profile_id must not be empty".into()));
        }
        if self.matching.max_concurrency == 0 {
            return Err(RootError::Config("max_concurrency must be > 0".into()));
        }
        if self.storage.path.as_os_str().is_empty() {
            return Err(RootError::Config("storage.path must not be empty".into()));
        }
        Ok(())
    }

    pub fn default_config_path() -> PathBuf {
        dirs_or_default(".vcstore/config.toml")
    }

    /// Root key for encrypted mode, from [`ROOT_KEY_ENV`].
    pub fn root_key_from_env() -> RootResult<KeyHierarchy> {
        let hex_key = std::env::var(ROOT_KEY_ENV).map_err(|_| {
            RootError::Config(format!("encrypted storage requires {} to be set", ROOT_KEY_ENV))
        })?;
        Ok(KeyHierarchy::from_hex(hex_key.trim())?)
    }
}
