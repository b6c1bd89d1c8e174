// src/config/loader.rs

use std::path::Path;

use tracing::{debug, info};

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::Result;

/// Parse the TOML at `path` without semantic checks.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let text = std::fs::read_to_string(path.as_ref())?;
    Ok(toml::from_str(&text)?)
}

/// Parse and validate; the path table is resolved here so a missing entry
/// fails at startup rather than when a task first runs.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let path = path.as_ref();
    let config = ConfigFile::try_from(load_from_path(path)?)?;
    info!(config = %path.display(), "loaded configuration");
    Ok(config)
}

/// A config file that does not exist means "use the built-in defaults".
pub fn load_or_default(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let path = path.as_ref();
    if !path.exists() {
        debug!(config = %path.display(), "no config file; using defaults");
        return ConfigFile::try_from(RawConfigFile::default());
    }
    load_and_validate(path)
}
