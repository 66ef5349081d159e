//! Runtime configuration stored in `.respawn/config.toml`.
//!
//! ```toml
//! [store]
//! backend = "redis"
//! redis_url = "${REDIS_URL}"
//! prefix = "respawn"
//!
//! [identity]
//! admin_email = "admin@example.com"
//!
//! [favorites]
//! batch_size = 10
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{errors::ConfigError, store::MAX_BATCH_IDS};

pub const CONFIG_DIR: &str = ".respawn";
pub const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreSettings,
    #[serde(default)]
    pub identity: IdentitySettings,
    #[serde(default)]
    pub favorites: FavoritesSettings,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Memory,
    Redis,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreSettings {
    #[serde(default)]
    pub backend: Backend,
    #[serde(default = "default_redis_url")]
    pub redis_url: String,
    #[serde(default = "default_prefix")]
    pub prefix: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            redis_url: default_redis_url(),
            prefix: default_prefix(),
        }
    }
}

fn default_redis_url() -> String {
    "${REDIS_URL}".to_string()
}

fn default_prefix() -> String {
    "respawn".to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IdentitySettings {
    /// Email of the account allowed to manage categories. Sign-ups with it are rejected.
    #[serde(default)]
    pub admin_email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FavoritesSettings {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for FavoritesSettings {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
        }
    }
}

fn default_batch_size() -> usize {
    MAX_BATCH_IDS
}

impl Config {
    /// Conventional location below `root`.
    pub fn path_in(root: &Path) -> PathBuf {
        root.join(CONFIG_DIR).join(CONFIG_FILE)
    }

    /// Loads `path`, falling back to defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.favorites.batch_size == 0 || self.favorites.batch_size > MAX_BATCH_IDS {
            return Err(ConfigError::Invalid(
                format!("favorites.batch_size must be between 1 and {MAX_BATCH_IDS}").into(),
            ));
        }
        if self.store.prefix.trim().is_empty() {
            return Err(ConfigError::Invalid("store.prefix must not be empty".into()));
        }
        Ok(())
    }

    /// Redis URL with a `${VAR}` value expanded from the environment.
    pub fn redis_url(&self) -> Result<String, ConfigError> {
        let url = self.store.redis_url.as_str();
        match url.strip_prefix("${").and_then(|rest| rest.strip_suffix('}')) {
            Some(var_name) => std::env::var(var_name).map_err(|_| ConfigError::MissingEnv(var_name.to_string())),
            None => Ok(url.to_string()),
        }
    }
}
