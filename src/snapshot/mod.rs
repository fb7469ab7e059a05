// src/snapshot/mod.rs

//! File fingerprints and point-in-time snapshots of a base directory.
//!
//! A [`Snapshot`] maps every tracked file (relative, `/`-separated path) to
//! a [`Fingerprint`]. Directories are not fingerprinted; their change state
//! is derived from their descendants.

pub mod hash;
pub mod walk;

use std::collections::BTreeMap;
use std::path::Path;
use std::time::SystemTime;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::fs::FileSystem;
use crate::patterns::PathFilter;
use crate::types::FingerprintPolicy;

pub use hash::{base_dir_key, compute_file_hash};
pub use walk::{walk, WalkEntry};

/// Cheap change-detection signature for one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Fingerprint {
    Metadata { size: u64, modified: SystemTime },
    Content { size: u64, hash: String },
}

impl Fingerprint {
    /// Fingerprint `path` under the given policy.
    pub fn of(fs: &dyn FileSystem, path: &Path, policy: FingerprintPolicy) -> Result<Self> {
        let meta = fs.metadata(path)?;
        Ok(match policy {
            FingerprintPolicy::Metadata => Fingerprint::Metadata {
                size: meta.len,
                modified: meta.modified,
            },
            FingerprintPolicy::Content => Fingerprint::Content {
                size: meta.len,
                hash: compute_file_hash(fs, path)?,
            },
        })
    }
}

/// State of a base directory's tracked files at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot {
    files: BTreeMap<String, Fingerprint>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, rel: &str) -> Option<&Fingerprint> {
        self.files.get(rel)
    }

    pub fn contains(&self, rel: &str) -> bool {
        self.files.contains_key(rel)
    }

    pub fn insert(&mut self, rel: impl Into<String>, fingerprint: Fingerprint) {
        self.files.insert(rel.into(), fingerprint);
    }

    pub fn remove(&mut self, rel: &str) -> Option<Fingerprint> {
        self.files.remove(rel)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Tracked paths in sorted order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Fingerprint)> {
        self.files.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// What a snapshot walk skips.
#[derive(Debug, Clone, Default)]
pub struct TrackingRules {
    /// Directory (relative to the base directory) holding persisted state.
    pub state_dir: Option<String>,
    /// Files matching this filter's excludes are not tracked.
    pub filter: PathFilter,
}

impl TrackingRules {
    pub fn prunes(&self, rel_dir: &str) -> bool {
        self.state_dir.as_deref() == Some(rel_dir)
    }

    pub fn tracks(&self, rel_file: &str) -> bool {
        self.filter.matches(rel_file)
    }
}

/// Walk `base_dir` once and fingerprint every tracked file.
pub fn capture(
    fs: &dyn FileSystem,
    base_dir: &Path,
    rules: &TrackingRules,
    policy: FingerprintPolicy,
) -> Result<Snapshot> {
    let mut snapshot = Snapshot::new();
    for entry in walk(fs, base_dir, &|rel: &str| rules.prunes(rel))? {
        if entry.is_dir || !rules.tracks(&entry.rel) {
            continue;
        }
        let fingerprint = Fingerprint::of(fs, &entry.path, policy)?;
        snapshot.insert(entry.rel, fingerprint);
    }
    debug!(files = snapshot.len(), ?base_dir, "captured snapshot");
    Ok(snapshot)
}
