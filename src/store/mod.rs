// src/store/mod.rs

//! Persistence of the per-base-directory state unit.
//!
//! The unit bundles the snapshot, the value registry and the diagnostics
//! registry. Two stores are provided: a file-backed one with atomic
//! replace semantics and an in-memory one.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::fs::FileSystem;
use crate::messages::MessageMap;
use crate::snapshot::{base_dir_key, Snapshot};
use crate::state::ValueMap;
use crate::types::FingerprintPolicy;

/// Format version of [`PersistedState`]. Records carrying any other
/// version are ignored.
pub const STATE_VERSION: u32 = 1;

/// Everything one build hands to the next.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
    pub version: u32,
    pub base_dir: PathBuf,
    pub policy: FingerprintPolicy,
    #[serde(default)]
    pub snapshot: Snapshot,
    #[serde(default)]
    pub values: ValueMap,
    #[serde(default)]
    pub messages: MessageMap,
}

impl PersistedState {
    pub fn new(base_dir: PathBuf, policy: FingerprintPolicy) -> Self {
        Self {
            version: STATE_VERSION,
            base_dir,
            policy,
            snapshot: Snapshot::new(),
            values: ValueMap::new(),
            messages: MessageMap::new(),
        }
    }
}

/// Abstract storage for the persisted state unit.
pub trait StateStore: Send + Sync {
    /// `Ok(None)` if nothing usable has been stored yet.
    fn load(&self) -> Result<Option<PersistedState>>;
    fn persist(&mut self, state: &PersistedState) -> Result<()>;
    /// Forget any stored state.
    fn clear(&mut self) -> Result<()>;
}

/// Stores state as JSON at `<state_dir>/<key>.json`.
///
/// Persisting writes a sibling `.tmp` file and renames it over the target,
/// so a crash never leaves a half-written record behind.
pub struct FileStateStore {
    fs: Arc<dyn FileSystem>,
    path: PathBuf,
}

impl FileStateStore {
    pub fn new(fs: Arc<dyn FileSystem>, state_dir: &Path, base_dir: &Path) -> Self {
        let path = state_dir.join(format!("{}.json", base_dir_key(base_dir)));
        Self { fs, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(".tmp");
        PathBuf::from(name)
    }
}

impl StateStore for FileStateStore {
    fn load(&self) -> Result<Option<PersistedState>> {
        if !self.fs.is_file(&self.path) {
            debug!(path = ?self.path, "no persisted state");
            return Ok(None);
        }

        let bytes = self.fs.read(&self.path)?;
        let raw: serde_json::Value = serde_json::from_slice(&bytes)
            .with_context(|| format!("parsing persisted state at {:?}", self.path))?;

        let version = raw.get("version").and_then(serde_json::Value::as_u64);
        if version != Some(u64::from(STATE_VERSION)) {
            info!(path = ?self.path, ?version, "ignoring persisted state with unknown version");
            return Ok(None);
        }

        let state: PersistedState = serde_json::from_value(raw)
            .with_context(|| format!("decoding persisted state at {:?}", self.path))?;
        Ok(Some(state))
    }

    fn persist(&mut self, state: &PersistedState) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(state).context("serializing build state")?;
        let temp = self.temp_path();

        self.fs.write(&temp, &bytes)?;
        if let Err(e) = self.fs.rename(&temp, &self.path) {
            // Leave the previous record untouched; just drop our temp file.
            let _ = self.fs.remove_file(&temp);
            return Err(e);
        }

        info!(
            path = ?self.path,
            files = state.snapshot.len(),
            values = state.values.len(),
            "persisted build state (file)"
        );
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        if self.fs.is_file(&self.path) {
            self.fs.remove_file(&self.path)?;
            info!(path = ?self.path, "cleared build state (file)");
        }
        Ok(())
    }
}

/// Stores state in memory only.
///
/// Clones share the same slot, so one handle can be given to successive
/// build contexts in the same process.
#[derive(Clone, Default)]
pub struct MemoryStateStore {
    slot: Arc<Mutex<Option<PersistedState>>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStateStore {
    fn load(&self) -> Result<Option<PersistedState>> {
        let slot = self
            .slot
            .lock()
            .map_err(|_| anyhow!("memory state store lock poisoned"))?;
        Ok(slot.clone())
    }

    fn persist(&mut self, state: &PersistedState) -> Result<()> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| anyhow!("memory state store lock poisoned"))?;
        *slot = Some(state.clone());
        info!(files = state.snapshot.len(), "persisted build state (memory)");
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| anyhow!("memory state store lock poisoned"))?;
        *slot = None;
        Ok(())
    }
}
