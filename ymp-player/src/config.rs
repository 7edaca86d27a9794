//! Configuration for the ymp player
//!
//! # Settings Sources Priority
//!
//! 1. Command-line arguments (`--token`, `--uid`, ...)
//! 2. Environment variables (`YA_MUSIC_TOKEN`, `YA_MUSIC_ID`), also read from `.env`
//! 3. TOML configuration file (`~/.config/ymp/config.toml`)
//! 4. Built-in defaults
//!
//! Levels 1 and 2 arrive together as [`ConfigOverrides`] (clap reads the
//! environment fallbacks); this module merges them over the TOML file.

use crate::audio::config::{AudioConfig, AudioSettings, SampleFormat};
use crate::catalog::DEFAULT_API_URL;
use crate::error::{Error, Result};
use crate::update::DEFAULT_RELEASE_REPO;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Application name used for the config directory
pub const APP_NAME: &str = "ymp";

/// TOML file contents
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    /// OAuth token
    #[serde(default)]
    pub token: Option<String>,

    /// Account id (looked up from the token when absent)
    #[serde(default)]
    pub uid: Option<u64>,

    #[serde(default)]
    pub api_url: Option<String>,

    /// Where downloaded tracks are written
    #[serde(default)]
    pub download_dir: Option<PathBuf>,

    /// GitHub `owner/name` checked by the update command
    #[serde(default)]
    pub update_repo: Option<String>,

    #[serde(default)]
    pub audio: AudioSettings,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("downloads")
}

/// Values given on the command line or through the environment
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub token: Option<String>,
    pub uid: Option<u64>,
    pub api_url: Option<String>,
    pub download_dir: Option<PathBuf>,
    pub sample_rate: Option<u32>,
    pub channels: Option<u16>,
    pub format: Option<String>,
    pub buffer_size: Option<usize>,
    pub log_level: Option<String>,
}

/// Fully resolved settings
#[derive(Debug, Clone)]
pub struct PlayerConfig {
    pub token: String,
    pub uid: Option<u64>,
    pub api_url: String,
    pub download_dir: PathBuf,
    pub update_repo: String,
    pub audio: AudioConfig,
    pub log_level: String,
}

impl PlayerConfig {
    /// Load the TOML file (explicit path or default location) and apply overrides.
    pub fn load(config_path: Option<&Path>, overrides: ConfigOverrides) -> Result<Self> {
        let toml: TomlConfig = ymp_common::config::load_config(config_path, APP_NAME)?;
        Self::resolve(toml, overrides)
    }

    /// Merge overrides over file values and defaults.
    pub fn resolve(toml: TomlConfig, overrides: ConfigOverrides) -> Result<Self> {
        let token = overrides
            .token
            .or(toml.token)
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                Error::Config("missing OAuth token: set YA_MUSIC_TOKEN or pass --token".to_string())
            })?;

        let audio = AudioSettings {
            sample_rate: overrides.sample_rate.or(toml.audio.sample_rate),
            channels: overrides.channels.or(toml.audio.channels),
            format: overrides.format.or(toml.audio.format),
            buffer_size: overrides.buffer_size.or(toml.audio.buffer_size),
        };

        Ok(Self {
            token,
            uid: overrides.uid.or(toml.uid),
            api_url: overrides
                .api_url
                .or(toml.api_url)
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            download_dir: overrides
                .download_dir
                .or(toml.download_dir)
                .unwrap_or_else(default_download_dir),
            update_repo: toml
                .update_repo
                .unwrap_or_else(|| DEFAULT_RELEASE_REPO.to_string()),
            audio: AudioConfig::from_settings(&audio),
            log_level: overrides.log_level.unwrap_or(toml.logging.level),
        })
    }

    pub fn sample_format(&self) -> SampleFormat {
        self.audio.format()
    }
}
