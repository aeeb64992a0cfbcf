//! Server configuration file.
//!
//! One JSON document holds the listen address, the YouTube credentials
//! and tunables, and the directory for the additions log. A missing file
//! is created with defaults so the operator has something to fill in.

use std::fs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use tubekeep_core::ServiceConfig;

/// Default configuration file location, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/tubekeep.json";

/// Default HTTP port.
pub const DEFAULT_PORT: u16 = 8080;

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiConfig {
    /// Address to bind.
    #[serde(default = "default_host")]
    pub host: IpAddr,
    /// Port to bind.
    #[serde(default = "default_port")]
    pub port: u16,
}

const fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

const fn default_port() -> u16 {
    DEFAULT_PORT
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ApiConfig {
    /// Socket address to bind.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

/// The whole configuration document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    /// HTTP listener.
    #[serde(default)]
    pub api: ApiConfig,
    /// YouTube credentials and engine tunables.
    #[serde(default)]
    pub youtube: ServiceConfig,
    /// Where the additions log lives.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("youtubedata")
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            youtube: ServiceConfig::default(),
            data_dir: default_data_dir(),
        }
    }
}

impl AppConfig {
    /// Load the configuration at `path`, writing defaults if it does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!("Config file not found at {}, using defaults", path.display());
            let config = Self::default();
            if let Err(e) = config.save(path) {
                warn!("Failed to save default config: {}", e);
            }
            return Ok(config);
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let config: Self =
            serde_json::from_str(&content).map_err(|e| ConfigError::ParseFailed {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        info!("Loaded config from {}", path.display());
        debug!(
            "Listening on {}, data in {}",
            config.api.socket_addr(),
            config.data_dir.display()
        );
        Ok(config)
    }

    /// Write the configuration to `path` as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).map_err(|e| ConfigError::WriteFailed {
                path: parent.to_path_buf(),
                reason: format!("Failed to create config directory: {e}"),
            })?;
        }

        let content = serde_json::to_string_pretty(self).map_err(|e| ConfigError::ParseFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        fs::write(path, content).map_err(|e| ConfigError::WriteFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        info!("Saved config to {}", path.display());
        Ok(())
    }
}

/// Configuration bound to its file, for writers that outlive startup.
///
/// The credential rotation hook runs on a background task and must not
/// clobber edits made through other paths, so every write goes through
/// one lock.
#[derive(Debug)]
pub struct ConfigFile {
    path: PathBuf,
    config: Mutex<AppConfig>,
}

impl ConfigFile {
    /// Load (or create) the configuration at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let config = AppConfig::load(&path)?;
        Ok(Self {
            path,
            config: Mutex::new(config),
        })
    }

    /// File location.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Copy of the current configuration.
    pub fn snapshot(&self) -> Result<AppConfig, ConfigError> {
        self.config
            .lock()
            .map(|guard| guard.clone())
            .map_err(|_| ConfigError::Poisoned)
    }

    /// Replace the stored refresh credential and persist.
    pub fn set_refresh_token(&self, token: &str) -> Result<(), ConfigError> {
        let mut guard = self.config.lock().map_err(|_| ConfigError::Poisoned)?;
        guard.youtube.refresh_token = token.to_string();
        guard.save(&self.path)
    }
}

/// Configuration file errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file exists but could not be read.
    #[error("Failed to read config {path}: {reason}")]
    ReadFailed {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        reason: String,
    },

    /// The file or its parent directory could not be written.
    #[error("Failed to write config {path}: {reason}")]
    WriteFailed {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        reason: String,
    },

    /// The file is not valid configuration JSON.
    #[error("Failed to parse config {path}: {reason}")]
    ParseFailed {
        /// File path.
        path: PathBuf,
        /// Parser message.
        reason: String,
    },

    /// A writer panicked while holding the configuration lock.
    #[error("Config lock poisoned")]
    Poisoned,
}
