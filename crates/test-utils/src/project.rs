use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result};
use tempfile::TempDir;

use buildctx::{BuildContext, ContextConfig};

/// A throwaway base directory on the real filesystem.
///
/// The temp dir is canonicalised up front so that paths handed out by the
/// fixture compare equal to the context's base directory (macOS puts temp
/// dirs behind a `/var` -> `/private/var` symlink).
pub struct Project {
    _dir: TempDir,
    root: PathBuf,
}

impl Project {
    pub fn new() -> Result<Self> {
        let dir = tempfile::tempdir()?;
        let root = dir.path().canonicalize()?;
        Ok(Self { _dir: dir, root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.root.join(rel)
    }

    pub fn write(&self, rel: &str, contents: impl AsRef<[u8]>) -> Result<PathBuf> {
        let path = self.path(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, contents).with_context(|| format!("writing {:?}", path))?;
        Ok(path)
    }

    pub fn remove(&self, rel: &str) -> Result<()> {
        let path = self.path(rel);
        if path.is_dir() {
            fs::remove_dir_all(&path)?;
        } else {
            fs::remove_file(&path)?;
        }
        Ok(())
    }

    /// Set the modification time of `rel` to `secs` seconds after the epoch.
    pub fn set_mtime(&self, rel: &str, secs: u64) -> Result<()> {
        let file = File::options().write(true).open(self.path(rel))?;
        file.set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(secs))?;
        Ok(())
    }

    pub fn mtime(&self, rel: &str) -> Result<SystemTime> {
        Ok(fs::metadata(self.path(rel))?.modified()?)
    }

    /// Open a context over this project with the given config.
    pub fn open(&self, cfg: &ContextConfig) -> Result<BuildContext> {
        Ok(BuildContext::open(&self.root, cfg)?)
    }
}
