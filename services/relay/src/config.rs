//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! The Spotify client secret is loaded from the SPOTIFY_CLIENT_SECRET env
//! var or client_secret_file, never stored in the TOML directly to avoid
//! leaking secrets.

use common::Secret;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub spotify: SpotifyConfig,
    pub store: StoreConfig,
    #[serde(default)]
    pub registry: Option<RegistryConfig>,
}

/// Inbound HTTP settings
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    /// Where the browser is sent after a successful callback
    pub frontend_url: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

/// Spotify application credentials
#[derive(Debug, Deserialize)]
pub struct SpotifyConfig {
    pub client_id: String,
    pub redirect_uri: String,
    #[serde(skip)]
    pub client_secret: Option<Secret<String>>,
    /// Path to a file containing the client secret (alternative to the
    /// SPOTIFY_CLIENT_SECRET env var)
    #[serde(default)]
    pub client_secret_file: Option<PathBuf>,
}

/// Credential store backend selection
#[derive(Debug, Deserialize)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Token file location; required for the `file` backend
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// How often the cleanup sweep runs; 0 disables it
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
    /// Retention age for stored records
    #[serde(default = "default_max_age")]
    pub max_age_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    File,
}

/// Best-effort user registry (optional)
#[derive(Debug, Deserialize)]
pub struct RegistryConfig {
    pub path: PathBuf,
}

fn default_request_timeout() -> u64 {
    30
}

fn default_max_connections() -> usize {
    1024
}

fn default_sweep_interval() -> u64 {
    3600
}

fn default_max_age() -> u64 {
    86_400
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    ///
    /// Client secret resolution order:
    /// 1. SPOTIFY_CLIENT_SECRET env var
    /// 2. client_secret_file path from config
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        for (field, url) in [
            ("frontend_url", &config.server.frontend_url),
            ("redirect_uri", &config.spotify.redirect_uri),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(common::Error::Config(format!(
                    "{field} must start with http:// or https://, got: {url}"
                )));
            }
        }

        if config.spotify.client_id.is_empty() {
            return Err(common::Error::Config("client_id must not be empty".into()));
        }

        if config.server.request_timeout_secs == 0 {
            return Err(common::Error::Config(
                "request_timeout_secs must be greater than 0".into(),
            ));
        }

        if config.server.max_connections == 0 {
            return Err(common::Error::Config(
                "max_connections must be greater than 0".into(),
            ));
        }

        if config.store.backend == StoreBackend::File && config.store.path.is_none() {
            return Err(common::Error::Config(
                "store.path is required for the file backend".into(),
            ));
        }

        if config.store.sweep_interval_secs > 0 && config.store.max_age_secs == 0 {
            return Err(common::Error::Config(
                "max_age_secs must be greater than 0 when the sweep is enabled".into(),
            ));
        }

        // Resolve client secret: env var takes precedence over file
        if let Ok(secret) = std::env::var("SPOTIFY_CLIENT_SECRET") {
            config.spotify.client_secret = Some(Secret::new(secret));
        } else if let Some(ref secret_file) = config.spotify.client_secret_file {
            let secret = std::fs::read_to_string(secret_file).map_err(|e| {
                common::Error::Config(format!(
                    "failed to read client_secret_file {}: {e}",
                    secret_file.display()
                ))
            })?;
            let secret = secret.trim().to_owned();
            if !secret.is_empty() {
                config.spotify.client_secret = Some(Secret::new(secret));
            }
        }

        if config.spotify.client_secret.is_none() {
            return Err(common::Error::Config(
                "no client secret: set SPOTIFY_CLIENT_SECRET or client_secret_file".into(),
            ));
        }

        Ok(config)
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("wallify-relay.toml")
    }
}
