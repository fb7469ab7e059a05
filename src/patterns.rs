// src/patterns.rs

//! Include/exclude glob filtering over relative paths.

use std::fmt;

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};

use crate::errors::{BuildContextError, Result};

/// Compiled include/exclude globs.
///
/// Patterns are matched against `/`-separated relative paths. `*` does not
/// cross directory boundaries; use `**` for that. An empty include list
/// means "everything".
#[derive(Clone, Default)]
pub struct PathFilter {
    include_set: Option<GlobSet>,
    exclude_set: Option<GlobSet>,
}

impl fmt::Debug for PathFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathFilter")
            .field("includes", &self.include_set.as_ref().map(GlobSet::len))
            .field("excludes", &self.exclude_set.as_ref().map(GlobSet::len))
            .finish()
    }
}

impl PathFilter {
    pub fn new(includes: &[String], excludes: &[String]) -> Result<Self> {
        Ok(Self {
            include_set: build_optional_globset(includes)?,
            exclude_set: build_optional_globset(excludes)?,
        })
    }

    /// Filter that only excludes.
    pub fn excluding(excludes: &[String]) -> Result<Self> {
        Self::new(&[], excludes)
    }

    pub fn matches(&self, rel_path: &str) -> bool {
        if let Some(include) = &self.include_set {
            if !include.is_match(rel_path) {
                return false;
            }
        }
        if let Some(exclude) = &self.exclude_set {
            if exclude.is_match(rel_path) {
                return false;
            }
        }
        true
    }
}

fn build_optional_globset(patterns: &[String]) -> Result<Option<GlobSet>> {
    if patterns.is_empty() {
        Ok(None)
    } else {
        build_globset(patterns).map(Some)
    }
}

/// Build a GlobSet from simple string patterns.
pub fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob = GlobBuilder::new(pat)
            .literal_separator(true)
            .build()
            .map_err(|e| BuildContextError::PatternError(format!("{pat}: {e}")))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| BuildContextError::PatternError(e.to_string()))
}
