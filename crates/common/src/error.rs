//! Configuration errors shared by the marketplace binaries

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// A setting is present but unusable
    #[error("Configuration error: {0}")]
    Config(String),

    /// A required setting was supplied by neither the file nor the environment
    #[error("Missing setting: {setting} (set it in the config file or {env})")]
    Missing {
        setting: &'static str,
        env: &'static str,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
