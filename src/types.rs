use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How file fingerprints are computed for a snapshot.
///
/// - `Metadata`: size + modification time. Cheap, the default.
/// - `Content`: size + blake3 digest of the file bytes. For filesystems
///   where mtimes cannot be trusted (network mounts, clock skew).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FingerprintPolicy {
    Metadata,
    Content,
}

impl Default for FingerprintPolicy {
    fn default() -> Self {
        FingerprintPolicy::Metadata
    }
}

impl FromStr for FingerprintPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "metadata" => Ok(FingerprintPolicy::Metadata),
            "content" | "hash" => Ok(FingerprintPolicy::Content),
            other => Err(format!(
                "invalid fingerprint policy: {other} (expected \"metadata\" or \"content\")"
            )),
        }
    }
}

/// Where the persisted state unit lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageMode {
    /// Store state in a file under the state directory.
    File,
    /// Keep state in memory only (lost when the process exits).
    Memory,
}

impl Default for StorageMode {
    fn default() -> Self {
        StorageMode::File
    }
}

/// Outcome reported when a build context is finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildOutcome {
    Success,
    /// Changed inputs stay "changed" for the next build.
    Failure,
}
