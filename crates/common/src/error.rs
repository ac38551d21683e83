//! Workspace-wide error type for configuration and startup failures.
//!
//! Per-request failures have their own taxonomies in `spotify-client` and
//! `token-store`; this type only covers concerns shared by every crate
//! (config parsing, file I/O during startup).

use thiserror::Error;

/// Common error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Result alias using common Error
pub type Result<T> = std::result::Result<T, Error>;
