//! Persistence of the last used connection parameters.
//!
//! The record is a small JSON document (`{"plantId": "...", "comPort": "..."}`)
//! kept at a fixed location, `config.json` in the working directory unless
//! told otherwise.

use log::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Errors while reading or writing the connection record.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Cannot read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Cannot write config file {path:?}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Cannot serialize config: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Which plant is monitored and where its PLC is attached.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionConfig {
    #[serde(default)]
    pub plant_id: String,
    #[serde(default, rename = "comPort", alias = "port")]
    pub port: String,
}

impl ConnectionConfig {
    pub fn new(plant_id: impl Into<String>, port: impl Into<String>) -> Self {
        Self {
            plant_id: plant_id.into(),
            port: port.into(),
        }
    }
}

/// Loads and saves a [`ConnectionConfig`] at a fixed path.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub const DEFAULT_CONFIG_FILE: &'static str = "config.json";

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the stored record.
    ///
    /// A missing file is created with an empty record first.
    pub fn load(&self) -> Result<ConnectionConfig, Error> {
        if !self.path.exists() {
            info!("No config file at {:?}, creating a default one", self.path);
            self.save(&ConnectionConfig::default())?;
        }
        let data = std::fs::read_to_string(&self.path).map_err(|source| Error::Read {
            path: self.path.clone(),
            source,
        })?;
        serde_json::from_str(&data).map_err(|source| Error::Parse {
            path: self.path.clone(),
            source,
        })
    }

    /// Replaces the stored record with `config`.
    pub fn save(&self, config: &ConnectionConfig) -> Result<(), Error> {
        let data = serde_json::to_string_pretty(config)?;
        std::fs::write(&self.path, data).map_err(|source| Error::Write {
            path: self.path.clone(),
            source,
        })?;
        debug!("Saved {config:?} to {:?}", self.path);
        Ok(())
    }
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CONFIG_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn load_creates_default() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("config.json"));

        assert_eq!(store.load().unwrap(), ConnectionConfig::default());
        assert!(store.path().exists());
        assert_eq!(store.load().unwrap(), ConnectionConfig::new("", ""));
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("config.json"));

        for config in [
            ConnectionConfig::new("PLANT-07", "COM9"),
            ConnectionConfig::new("", "/dev/ttyUSB0"),
            ConnectionConfig::new("Ünïcode \"plant\"", ""),
        ] {
            store.save(&config).unwrap();
            assert_eq!(store.load().unwrap(), config);
        }
    }

    #[test]
    fn file_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "plantId": "P1", "comPort": "COM3" }"#).unwrap();

        let store = ConfigStore::new(&path);
        assert_eq!(store.load().unwrap(), ConnectionConfig::new("P1", "COM3"));

        store.save(&ConnectionConfig::new("P2", "COM4")).unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["plantId"], "P2");
        assert_eq!(json["comPort"], "COM4");
    }

    #[test]
    fn corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "plantId = P1").unwrap();

        assert_matches!(ConfigStore::new(&path).load(), Err(Error::Parse { .. }));
    }

    #[test]
    fn unwritable_location_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("missing").join("config.json"));

        assert_matches!(store.load(), Err(Error::Write { .. }));
    }
}
