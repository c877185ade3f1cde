//! Application configuration management.
//!
//! This module handles loading and saving the application configuration,
//! which includes an optional authentication-service URL override and the
//! directory the credential cache and session vault live in.
//!
//! Configuration is stored at `~/.config/chatvault/config.json`.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Application name used for config/data directory paths
const APP_NAME: &str = "chatvault";

/// Config file name
const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Override for the authentication service base URL
    pub api_base_url: Option<String>,
    /// Override for the store directory; platform data dir when unset
    pub data_dir: Option<PathBuf>,
}

impl Config {
    pub fn load() -> Result<Self, StoreError> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            Ok(serde_json::from_str(&contents)?)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<(), StoreError> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf, StoreError> {
        let config_dir = dirs::config_dir().ok_or_else(|| {
            StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "could not resolve config directory",
            ))
        })?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Directory holding the account cache document and session vault
    pub fn data_dir(&self) -> Result<PathBuf, StoreError> {
        if let Some(ref dir) = self.data_dir {
            return Ok(dir.clone());
        }
        let data_dir = dirs::data_dir().ok_or_else(|| {
            StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "could not resolve data directory",
            ))
        })?;
        Ok(data_dir.join(APP_NAME))
    }
}
