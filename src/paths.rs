// src/paths.rs

//! Path helpers shared by the delta engine, scanners and the context.
//!
//! Tracked paths are always `/`-separated strings relative to the base
//! directory. The base directory itself is the empty string.

use std::path::{Component, Path, PathBuf};

use crate::fs::FileSystem;

/// Lexically normalise a path: drop `.` components and resolve `..`
/// against the preceding component where possible.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for comp in path.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn to_rel_string(rel: &Path) -> String {
    rel.components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Convert a path into a string relative to `root`, with forward slashes.
///
/// - First we try a lexical `strip_prefix(root)` on the normalised path.
/// - If that fails (e.g. due to symlinks or different absolute prefixes),
///   we canonicalize both paths and try again.
///
/// Returns `None` if the path cannot be related to `root`.
pub fn relative_str(fs: &dyn FileSystem, root: &Path, path: &Path) -> Option<String> {
    let normalized = normalize(path);
    if let Ok(rel) = normalized.strip_prefix(root) {
        return Some(to_rel_string(rel));
    }

    if let (Ok(root_canon), Ok(path_canon)) = (fs.canonicalize(root), fs.canonicalize(path)) {
        if let Ok(rel) = path_canon.strip_prefix(&root_canon) {
            return Some(to_rel_string(rel));
        }
    }

    None
}

/// Normalise a caller-supplied relative path string.
///
/// Accepts `\` or `/` separators, ignores empty and `.` segments. Returns
/// `None` if `..` segments escape the root.
pub fn normalize_rel(rel: &str) -> Option<String> {
    let mut parts: Vec<&str> = Vec::new();
    for seg in rel.split(['/', '\\']) {
        match seg {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            s => parts.push(s),
        }
    }
    Some(parts.join("/"))
}

/// True if `rel` is `dir` itself or lies below it. The empty `dir` is the root.
pub fn is_within(rel: &str, dir: &str) -> bool {
    dir.is_empty()
        || rel == dir
        || (rel.len() > dir.len() && rel.starts_with(dir) && rel.as_bytes()[dir.len()] == b'/')
}

/// Strip the `dir` prefix from a path known to be within it.
pub fn strip_dir<'a>(rel: &'a str, dir: &str) -> &'a str {
    if dir.is_empty() {
        rel
    } else if rel == dir {
        ""
    } else {
        &rel[dir.len() + 1..]
    }
}

/// Proper ancestors of `rel`, nearest first, excluding the root.
pub fn ancestors(rel: &str) -> impl Iterator<Item = &str> {
    let mut end = rel.len();
    std::iter::from_fn(move || {
        let idx = rel[..end].rfind('/')?;
        end = idx;
        Some(&rel[..idx])
    })
}
