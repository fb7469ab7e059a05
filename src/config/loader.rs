// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{ContextConfig, RawContextConfig};
use crate::errors::Result;

/// Default config file name, looked up in the base directory.
pub const DEFAULT_CONFIG_FILE: &str = "buildctx.toml";

/// Load a configuration file from a given path and return the raw
/// `RawContextConfig`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawContextConfig> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawContextConfig = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a configuration file from path and validate it.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ContextConfig> {
    let raw_config = load_from_path(&path)?;
    let config = ContextConfig::try_from(raw_config)?;
    Ok(config)
}

/// Like [`load_and_validate`], but a missing file yields the defaults.
pub fn load_or_default(path: impl AsRef<Path>) -> Result<ContextConfig> {
    let path = path.as_ref();
    if !path.exists() {
        debug!(?path, "no config file, using defaults");
        return Ok(ContextConfig::default());
    }
    load_and_validate(path)
}

/// Config path used when none is given: `buildctx.toml` in `base_dir`.
pub fn default_config_path(base_dir: &Path) -> PathBuf {
    base_dir.join(DEFAULT_CONFIG_FILE)
}
