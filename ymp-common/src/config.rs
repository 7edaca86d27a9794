//! Configuration file location and loading
//!
//! Settings are resolved in this priority order by the binaries:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! This module covers the file part: where the TOML file lives and how it is parsed.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Name of the per-application configuration file
const CONFIG_FILE_NAME: &str = "config.toml";

/// Locate the configuration file for an application.
///
/// Linux checks `~/.config/<app>/config.toml` first, then `/etc/<app>/config.toml`.
/// Other platforms use the per-user configuration directory only.
pub fn find_config_file(app_name: &str) -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join(app_name).join(CONFIG_FILE_NAME));

    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc").join(app_name).join(CONFIG_FILE_NAME);
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Parse a TOML file into `T`.
pub fn load_toml_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;

    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))
}

/// Load the application configuration file.
///
/// An explicitly requested path must exist. Without one, the default location is
/// searched and a missing file yields `T::default()`.
pub fn load_config<T>(explicit: Option<&Path>, app_name: &str) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    if let Some(path) = explicit {
        if !path.exists() {
            return Err(Error::NotFound(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        return load_toml_file(path);
    }

    match find_config_file(app_name) {
        Some(path) => {
            debug!("Loading configuration from {}", path.display());
            load_toml_file(&path)
        }
        None => {
            debug!("No config file found for {}, using defaults", app_name);
            Ok(T::default())
        }
    }
}
