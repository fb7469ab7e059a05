// src/config/validate.rs

use std::path::{Component, Path};

use crate::config::model::{ContextConfig, RawContextConfig};
use crate::errors::{BuildContextError, Result};
use crate::patterns::build_globset;

impl TryFrom<RawContextConfig> for ContextConfig {
    type Error = BuildContextError;

    fn try_from(raw: RawContextConfig) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ContextConfig::new_unchecked(raw.context, raw.snapshot, raw.scan))
    }
}

fn validate_raw_config(cfg: &RawContextConfig) -> Result<()> {
    validate_state_dir(&cfg.context.state_dir)?;
    validate_patterns("[snapshot].exclude", &cfg.snapshot.exclude)?;
    validate_patterns("[scan].default_excludes", &cfg.scan.default_excludes)?;
    Ok(())
}

fn validate_state_dir(state_dir: &str) -> Result<()> {
    if state_dir.trim().is_empty() {
        return Err(BuildContextError::ConfigError(
            "[context].state_dir must not be empty".to_string(),
        ));
    }

    let path = Path::new(state_dir);
    let escapes = path
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes {
        return Err(BuildContextError::ConfigError(format!(
            "[context].state_dir must be a relative path inside the base directory (got '{}')",
            state_dir
        )));
    }

    if path.components().all(|c| matches!(c, Component::CurDir)) {
        return Err(BuildContextError::ConfigError(format!(
            "[context].state_dir must name a subdirectory (got '{}')",
            state_dir
        )));
    }

    Ok(())
}

fn validate_patterns(field: &str, patterns: &[String]) -> Result<()> {
    build_globset(patterns).map_err(|e| {
        BuildContextError::ConfigError(format!("{field} contains an invalid glob: {e}"))
    })?;
    Ok(())
}
