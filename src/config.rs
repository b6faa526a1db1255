//! Config file parsing and validation.

use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};

use flate2::Compression;
use serde::Deserialize;

use crate::defaults::{CONFIG_PATH, STORE_PATH};
use crate::error::{AddContext, FeedStoreError};
use crate::Result;

pub trait ConfigProperties {
    fn store_location(&self) -> Option<&str>;
    fn compression(&self) -> CompressionLevel {
        CompressionLevel::Default
    }
}

#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum CompressionLevel {
    Fast,
    #[default]
    Default,
    Best,
}

impl From<CompressionLevel> for Compression {
    fn from(level: CompressionLevel) -> Self {
        match level {
            CompressionLevel::Fast => Compression::fast(),
            CompressionLevel::Default => Compression::default(),
            CompressionLevel::Best => Compression::best(),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct StoreSection {
    location: Option<String>,
    #[serde(default)]
    compression: CompressionLevel,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    store: StoreSection,
}

impl Config {
    pub fn new<T: Read>(mut reader: T) -> Result<Self> {
        let mut config_data = String::new();
        reader
            .read_to_string(&mut config_data)
            .err_context(FeedStoreError::ConfigurationError(
                "Unable to read config data".to_string(),
            ))?;
        let config: Config = toml::from_str(&config_data)
            .map_err(|err| FeedStoreError::ConfigurationError(err.to_string()))?;
        if let Some(location) = &config.store.location {
            if location.trim().is_empty() {
                return Err(FeedStoreError::ConfigurationError(
                    "store.location cannot be empty".to_string(),
                )
                .into());
            }
        }
        Ok(config)
    }

    /// Overrides the store location, ex. with a command line flag.
    pub fn with_store_location<S: Into<String>>(mut self, location: S) -> Self {
        self.store.location = Some(location.into());
        self
    }

    /// Falls back to the default store path under `home` when no location is
    /// configured.
    pub fn or_default_location(self, home: &str) -> Self {
        if self.store.location.is_some() {
            return self;
        }
        let location = PathBuf::from(home).join(STORE_PATH);
        self.with_store_location(location.to_string_lossy())
    }
}

impl ConfigProperties for Config {
    fn store_location(&self) -> Option<&str> {
        self.store.location.as_deref()
    }

    fn compression(&self) -> CompressionLevel {
        self.store.compression
    }
}

pub fn default_config_path(home: &str) -> PathBuf {
    PathBuf::from(home).join(CONFIG_PATH)
}

/// Reads the config file at `config_path`, or the default one under `home`.
/// A missing default config file is not an error, an explicitly given one is.
pub fn read_config(config_path: Option<&Path>, home: &str) -> Result<Config> {
    let (path, required) = match config_path {
        Some(path) => (path.to_path_buf(), true),
        None => (default_config_path(home), false),
    };
    match File::open(&path) {
        Ok(f) => Config::new(f).err_context(format!(
            "Unable to parse config file {}",
            path.to_string_lossy()
        )),
        Err(err) if !required && err.kind() == ErrorKind::NotFound => Ok(Config::default()),
        Err(err) => Err(FeedStoreError::ConfigurationError(format!(
            "Unable to open config file {}: {err}",
            path.to_string_lossy()
        ))
        .into()),
    }
}
