//! # Configuration
//!
//! Settings come from a TOML file and are then overridden by the environment:
//!
//! ```toml
//! store = "teststore.myshopify.com"
//! access_token = "shpat_..."
//! backup_dir = "/var/backups/shop"
//! backup_prefix = "nightly"
//! pool_size = 3
//! ```
//!
//! `SHOPIFY_STORE` and `SHOPIFY_ACCESS_TOKEN` take precedence over the file.

use crate::api::{DEFAULT_MAX_CREDITS, DEFAULT_RESTORE_RATE};
use crate::engine::DEFAULT_POOL_SIZE;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const ENV_STORE: &str = "SHOPIFY_STORE";
pub const ENV_ACCESS_TOKEN: &str = "SHOPIFY_ACCESS_TOKEN";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("missing setting: {0}")]
    Missing(&'static str),
    #[error("invalid setting {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Store domain, e.g. `teststore.myshopify.com`.
    pub store: String,
    pub access_token: String,
    /// Folder new backups are created in.
    pub backup_dir: PathBuf,
    pub backup_prefix: String,
    /// Workers per resource type.
    pub pool_size: usize,
    /// Initial bucket size; replaced by the server's figure after the first response.
    pub max_credits: f64,
    pub restore_rate: f64,
    pub dry_run: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store: String::new(),
            access_token: String::new(),
            backup_dir: std::env::temp_dir(),
            backup_prefix: "backup".to_string(),
            pool_size: DEFAULT_POOL_SIZE,
            max_credits: DEFAULT_MAX_CREDITS,
            restore_rate: DEFAULT_RESTORE_RATE,
            dry_run: false,
        }
    }
}

impl Config {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let s = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&s)
    }

    /// Applies `SHOPIFY_STORE` and `SHOPIFY_ACCESS_TOKEN`.
    pub fn apply_env(self) -> Self {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides looked up by environment variable name. Empty values
    /// are ignored.
    pub fn apply_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        if let Some(store) = get(ENV_STORE) {
            self.store = store;
        }
        if let Some(token) = get(ENV_ACCESS_TOKEN) {
            self.access_token = token;
        }
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store.trim().is_empty() {
            return Err(ConfigError::Missing("store"));
        }
        if self.access_token.trim().is_empty() {
            return Err(ConfigError::Missing("access_token"));
        }
        if self.pool_size == 0 {
            return Err(ConfigError::Invalid {
                name: "pool_size",
                reason: "must be at least 1".to_string(),
            });
        }
        if !(self.max_credits > 0.0 && self.restore_rate > 0.0) {
            return Err(ConfigError::Invalid {
                name: "max_credits/restore_rate",
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }
}
