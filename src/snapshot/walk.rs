// src/snapshot/walk.rs

use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::debug;

use crate::fs::FileSystem;
use crate::paths::relative_str;

/// One entry discovered below a walk root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkEntry {
    /// Path relative to the walk root, `/`-separated.
    pub rel: String,
    pub path: PathBuf,
    pub is_dir: bool,
}

/// Enumerate all files and directories under `root`, depth first.
///
/// Directories for which `prune` returns true (given their relative path)
/// are neither reported nor descended into, and neither are symlinks to
/// directories. The root itself is not reported. Output is sorted by
/// relative path.
pub fn walk(
    fs: &dyn FileSystem,
    root: &Path,
    prune: &dyn Fn(&str) -> bool,
) -> Result<Vec<WalkEntry>> {
    let mut entries = Vec::new();
    let mut stack = vec![root.to_path_buf()];

    while let Some(dir) = stack.pop() {
        for path in fs.read_dir(&dir)? {
            let Some(rel) = relative_str(fs, root, &path) else {
                continue;
            };
            if fs.is_dir(&path) {
                if prune(&rel) {
                    continue;
                }
                if fs.is_symlink(&path) {
                    debug!(%rel, "not following directory symlink");
                    continue;
                }
                stack.push(path.clone());
                entries.push(WalkEntry {
                    rel,
                    path,
                    is_dir: true,
                });
            } else if fs.is_file(&path) {
                entries.push(WalkEntry {
                    rel,
                    path,
                    is_dir: false,
                });
            }
        }
    }

    entries.sort_by(|a, b| a.rel.cmp(&b.rel));
    Ok(entries)
}
