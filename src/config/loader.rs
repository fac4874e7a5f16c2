// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::Result;

/// Environment variable that overrides the config file location.
pub const CONFIG_ENV: &str = "DEVCTL_CONFIG";

/// File name looked up in the working directory when `DEVCTL_CONFIG` is unset.
pub const DEFAULT_CONFIG_FILE: &str = "Devctl.toml";

/// Read and deserialize `path` without checking values.
///
/// Missing sections and fields take their defaults, so an empty file is a
/// valid configuration. See [`load_and_validate`] for the checked form.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let text = fs::read_to_string(path.as_ref())?;
    Ok(toml::from_str(&text)?)
}

/// Read, deserialize and validate `path`.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    ConfigFile::try_from(load_from_path(path)?)
}

pub fn default_config_path() -> PathBuf {
    std::env::var_os(CONFIG_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
}
