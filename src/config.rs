//! Server configuration
//!
//! Settings live in `config.json` under the platform config directory
//! (`~/.config/deskboard/` on Linux). A missing file is created with the
//! defaults; a partial file only overrides the fields it names.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use crate::data::{AGGREGATOR_BASE_URL, GEOCODING_BASE_URL, HACKER_NEWS_BASE_URL, OPEN_METEO_BASE_URL};

const APP_NAME: &str = "deskboard";
const CONFIG_FILE: &str = "config.json";
const DB_FILE: &str = "deskboard.db";

/// Errors from reading or writing the config file
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to access config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Default refresh periods per widget type, in seconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RefreshDefaults {
    pub weather: u64,
    pub headline_list: u64,
    pub aggregator: u64,
    pub pr_status: u64,
}

impl Default for RefreshDefaults {
    fn default() -> Self {
        Self {
            weather: 30 * 60,
            headline_list: 10 * 60,
            aggregator: 30 * 60,
            pr_status: 5 * 60,
        }
    }
}

/// Upstream base URLs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamUrls {
    pub forecast: String,
    pub geocoding: String,
    pub headlines: String,
    pub aggregator: String,
    /// Program used for pull-request queries
    pub gh_program: String,
}

impl Default for UpstreamUrls {
    fn default() -> Self {
        Self {
            forecast: OPEN_METEO_BASE_URL.to_string(),
            geocoding: GEOCODING_BASE_URL.to_string(),
            headlines: HACKER_NEWS_BASE_URL.to_string(),
            aggregator: AGGREGATOR_BASE_URL.to_string(),
            gh_program: "gh".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub http_timeout_secs: u64,
    pub command_timeout_secs: u64,
    pub reference_ttl_secs: u64,
    pub refresh: RefreshDefaults,
    pub upstream: UpstreamUrls,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5555,
            db_path: default_db_path(),
            http_timeout_secs: 10,
            command_timeout_secs: 20,
            reference_ttl_secs: 24 * 60 * 60,
            refresh: RefreshDefaults::default(),
            upstream: UpstreamUrls::default(),
        }
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", APP_NAME)
}

/// Database location under the platform data directory
///
/// Falls back to the working directory when no home directory is known.
fn default_db_path() -> PathBuf {
    project_dirs()
        .map(|dirs| dirs.data_dir().join(DB_FILE))
        .unwrap_or_else(|| PathBuf::from(DB_FILE))
}

impl Config {
    /// Path of `config.json` in the platform config directory
    pub fn default_path() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.config_dir().join(CONFIG_FILE))
    }

    /// Reads a config file, writing the defaults there first if it is missing
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            let config = Config::default();
            config.save_to(path)?;
            info!(path = %path.display(), "wrote default config");
            return Ok(config);
        }

        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Loads config, falling back to the defaults on any error
    ///
    /// # Arguments
    /// * `path` - Explicit config file, or `None` for the platform default
    pub fn load(path: Option<&Path>) -> Self {
        let path = match path.map(Path::to_path_buf).or_else(Config::default_path) {
            Some(path) => path,
            None => {
                warn!("no config directory available, using defaults");
                return Config::default();
            }
        };

        Config::load_from(&path).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
            Config::default()
        })
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    pub fn reference_ttl(&self) -> Duration {
        Duration::from_secs(self.reference_ttl_secs)
    }

    /// `host:port` for the listener
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
