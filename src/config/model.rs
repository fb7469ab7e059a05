// src/config/model.rs

use serde::Deserialize;

use crate::types::{FingerprintPolicy, StorageMode};

/// Configuration exactly as read from a TOML file, before validation.
///
/// ```toml
/// [context]
/// state_dir = ".buildctx"
/// storage = "file"
/// fingerprint = "metadata"
///
/// [snapshot]
/// exclude = ["target/**"]
///
/// [scan]
/// default_excludes = ["**/.git/**"]
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawContextConfig {
    #[serde(default)]
    pub context: ContextSection,

    #[serde(default)]
    pub snapshot: SnapshotSection,

    #[serde(default)]
    pub scan: ScanSection,
}

/// `[context]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ContextSection {
    /// Directory holding the persisted state, relative to the base
    /// directory. Never tracked or scanned.
    #[serde(default = "default_state_dir")]
    pub state_dir: String,

    #[serde(default)]
    pub storage: StorageMode,

    #[serde(default)]
    pub fingerprint: FingerprintPolicy,
}

fn default_state_dir() -> String {
    ".buildctx".to_string()
}

impl Default for ContextSection {
    fn default() -> Self {
        Self {
            state_dir: default_state_dir(),
            storage: StorageMode::default(),
            fingerprint: FingerprintPolicy::default(),
        }
    }
}

/// `[snapshot]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SnapshotSection {
    /// Files matching these globs are never tracked for changes.
    #[serde(default)]
    pub exclude: Vec<String>,
}

/// `[scan]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ScanSection {
    /// Patterns applied by `Scanner::add_default_excludes`.
    #[serde(default = "default_scan_excludes")]
    pub default_excludes: Vec<String>,
}

fn default_scan_excludes() -> Vec<String> {
    ["**/.git/**", "**/.git", "**/.svn/**", "**/.svn", "**/.hg/**", "**/.hg"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl Default for ScanSection {
    fn default() -> Self {
        Self {
            default_excludes: default_scan_excludes(),
        }
    }
}

/// Validated configuration.
///
/// Only obtainable through `TryFrom<RawContextConfig>` (see `validate.rs`)
/// or `Default`.
#[derive(Debug, Clone)]
pub struct ContextConfig {
    context: ContextSection,
    snapshot: SnapshotSection,
    scan: ScanSection,
}

impl ContextConfig {
    pub(crate) fn new_unchecked(
        context: ContextSection,
        snapshot: SnapshotSection,
        scan: ScanSection,
    ) -> Self {
        Self {
            context,
            snapshot,
            scan,
        }
    }

    pub fn context_section(&self) -> &ContextSection {
        &self.context
    }

    pub fn snapshot_section(&self) -> &SnapshotSection {
        &self.snapshot
    }

    pub fn scan_section(&self) -> &ScanSection {
        &self.scan
    }

    pub fn state_dir(&self) -> &str {
        &self.context.state_dir
    }

    pub fn storage(&self) -> StorageMode {
        self.context.storage
    }

    pub fn fingerprint(&self) -> FingerprintPolicy {
        self.context.fingerprint
    }
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self::new_unchecked(
            ContextSection::default(),
            SnapshotSection::default(),
            ScanSection::default(),
        )
    }
}
