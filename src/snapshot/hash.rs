// src/snapshot/hash.rs

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use blake3::Hasher;

use crate::fs::FileSystem;

/// Compute the blake3 hash of a single file.
pub fn compute_file_hash(fs: &dyn FileSystem, path: &Path) -> Result<String> {
    let mut hasher = Hasher::new();
    let mut file = fs
        .open_read(path)
        .with_context(|| format!("opening file for hashing: {:?}", path))?;
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize().to_hex().to_string())
}

/// Short, stable key derived from a base directory path.
///
/// Used to name the persisted state unit so that distinct base directories
/// sharing a state location never collide.
pub fn base_dir_key(base_dir: &Path) -> String {
    let hash = blake3::hash(base_dir.to_string_lossy().as_bytes());
    hash.to_hex()[..16].to_string()
}
