//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! The config file may be absent when MARKETPLACE_API_URL supplies the base
//! URL; every other field has a default.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_CONFIG_FILE: &str = "marketplace.toml";
const DEFAULT_STORAGE_FILE: &str = "marketplace-storage.json";

/// Root configuration
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Marketplace server settings
#[derive(Debug, Deserialize)]
pub struct ApiConfig {
    #[serde(default)]
    pub base_url: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

/// Where tokens and the cart are kept between runs
#[derive(Debug, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            timeout_secs: default_timeout(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
        }
    }
}

fn default_timeout() -> u64 {
    10
}

fn default_storage_path() -> PathBuf {
    PathBuf::from(DEFAULT_STORAGE_FILE)
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    ///
    /// A missing file is tolerated only if MARKETPLACE_API_URL is set.
    pub fn load(path: &Path) -> common::Result<Self> {
        let env_url = std::env::var("MARKETPLACE_API_URL").ok();

        let mut config: Config = match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && env_url.is_some() => {
                Config::default()
            }
            Err(e) => return Err(e.into()),
        };

        if let Some(url) = env_url {
            config.api.base_url = url;
        }
        config.api.base_url = config.api.base_url.trim().to_owned();

        if config.api.base_url.is_empty() {
            return Err(common::Error::Missing {
                setting: "api.base_url",
                env: "MARKETPLACE_API_URL",
            });
        }

        if !config.api.base_url.starts_with("http://")
            && !config.api.base_url.starts_with("https://")
        {
            return Err(common::Error::Config(format!(
                "base_url must start with http:// or https://, got: {}",
                config.api.base_url
            )));
        }

        if config.api.timeout_secs == 0 {
            return Err(common::Error::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }

        Ok(config)
    }

    /// Resolve config file path from CLI arg or MARKETPLACE_CONFIG env var.
    pub fn resolve_path(cli_path: Option<&Path>) -> PathBuf {
        if let Some(p) = cli_path {
            return p.to_path_buf();
        }
        if let Ok(p) = std::env::var("MARKETPLACE_CONFIG") {
            return PathBuf::from(p);
        }
        PathBuf::from(DEFAULT_CONFIG_FILE)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_secs)
    }
}
