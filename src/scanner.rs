// src/scanner.rs

//! Enumeration of files and directories below a directory, optionally
//! restricted to what changed (or was deleted) since the previous build.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::errors::Result;
use crate::fs::FileSystem;
use crate::patterns::PathFilter;
use crate::snapshot::walk;

/// What a scanner enumerates before include/exclude filtering.
#[derive(Debug, Clone)]
pub(crate) enum ScanSource {
    /// Outside the base directory: nothing.
    Empty,
    /// Everything currently on disk, skipping `prune` (a directory
    /// relative to the scanner's basedir).
    Walk { prune: Option<String> },
    /// A precomputed listing, relative to the scanner's basedir.
    Listed {
        files: Vec<String>,
        directories: BTreeSet<String>,
    },
}

/// Result of [`Scanner::scan`]. Paths are relative to the scanner's
/// basedir, `/`-separated and sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanResult {
    pub files: Vec<String>,
    pub directories: Vec<String>,
}

impl ScanResult {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.directories.is_empty()
    }
}

/// Filtered directory scanner produced by a build context.
#[derive(Clone)]
pub struct Scanner {
    fs: Arc<dyn FileSystem>,
    basedir: PathBuf,
    source: ScanSource,
    includes: Vec<String>,
    excludes: Vec<String>,
    default_excludes: Vec<String>,
}

impl fmt::Debug for Scanner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scanner")
            .field("basedir", &self.basedir)
            .field("source", &self.source)
            .field("includes", &self.includes)
            .field("excludes", &self.excludes)
            .finish_non_exhaustive()
    }
}

impl Scanner {
    pub(crate) fn new(
        fs: Arc<dyn FileSystem>,
        basedir: PathBuf,
        source: ScanSource,
        default_excludes: Vec<String>,
    ) -> Self {
        Self {
            fs,
            basedir,
            source,
            includes: Vec::new(),
            excludes: Vec::new(),
            default_excludes,
        }
    }

    pub fn basedir(&self) -> &Path {
        &self.basedir
    }

    /// Only report paths matching at least one of these globs.
    pub fn set_includes<I, S>(&mut self, patterns: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.includes = patterns.into_iter().map(Into::into).collect();
        self
    }

    /// Never report paths matching any of these globs.
    pub fn set_excludes<I, S>(&mut self, patterns: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excludes = patterns.into_iter().map(Into::into).collect();
        self
    }

    /// Also exclude the configured default patterns (VCS metadata etc).
    pub fn add_default_excludes(&mut self) -> &mut Self {
        self.excludes.extend(self.default_excludes.iter().cloned());
        self
    }

    pub fn scan(&self) -> Result<ScanResult> {
        let filter = PathFilter::new(&self.includes, &self.excludes)?;
        let mut result = ScanResult::default();

        match &self.source {
            ScanSource::Empty => {}
            ScanSource::Walk { prune } => {
                if !self.fs.is_dir(&self.basedir) {
                    debug!(basedir = ?self.basedir, "scan root is not a directory");
                    return Ok(result);
                }
                let prune = |rel: &str| prune.as_deref() == Some(rel);
                for entry in walk(self.fs.as_ref(), &self.basedir, &prune)? {
                    if !filter.matches(&entry.rel) {
                        continue;
                    }
                    if entry.is_dir {
                        result.directories.push(entry.rel);
                    } else {
                        result.files.push(entry.rel);
                    }
                }
            }
            ScanSource::Listed { files, directories } => {
                result.files = files.iter().filter(|f| filter.matches(f)).cloned().collect();
                result.directories = directories
                    .iter()
                    .filter(|d| filter.matches(d))
                    .cloned()
                    .collect();
                result.files.sort();
            }
        }

        debug!(
            basedir = ?self.basedir,
            files = result.files.len(),
            directories = result.directories.len(),
            "scan complete"
        );
        Ok(result)
    }
}
