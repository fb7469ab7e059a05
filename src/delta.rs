// src/delta.rs

//! Change detection between two snapshots.

use std::collections::BTreeSet;

use tracing::debug;

use crate::paths::{ancestors, is_within};
use crate::snapshot::Snapshot;

/// Paths that changed between the previous build and now.
///
/// Computed once per build context; unchanged paths are never listed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeltaSet {
    added: BTreeSet<String>,
    modified: BTreeSet<String>,
    removed: BTreeSet<String>,
}

impl DeltaSet {
    /// Classify every path in `current` and `prior`.
    pub fn compute(prior: &Snapshot, current: &Snapshot) -> Self {
        let mut delta = DeltaSet::default();

        for (rel, fingerprint) in current.iter() {
            match prior.get(rel) {
                None => {
                    delta.added.insert(rel.to_string());
                }
                Some(old) if old != fingerprint => {
                    delta.modified.insert(rel.to_string());
                }
                Some(_) => {}
            }
        }

        for rel in prior.paths() {
            if !current.contains(rel) {
                delta.removed.insert(rel.to_string());
            }
        }

        debug!(
            added = delta.added.len(),
            modified = delta.modified.len(),
            removed = delta.removed.len(),
            "computed delta"
        );
        delta
    }

    pub fn added(&self) -> &BTreeSet<String> {
        &self.added
    }

    pub fn modified(&self) -> &BTreeSet<String> {
        &self.modified
    }

    pub fn removed(&self) -> &BTreeSet<String> {
        &self.removed
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.removed.is_empty()
    }

    /// Added or modified paths, sorted.
    pub fn changed(&self) -> impl Iterator<Item = &str> {
        self.added
            .iter()
            .chain(self.modified.iter())
            .map(String::as_str)
    }

    /// True if `rel` was added or modified (not removed).
    pub fn is_changed(&self, rel: &str) -> bool {
        self.added.contains(rel) || self.modified.contains(rel)
    }

    /// True if `rel` itself, or anything below it, is in the delta.
    ///
    /// `rel` must already be normalised; the empty string is the root.
    pub fn touches(&self, rel: &str) -> bool {
        if self.added.contains(rel) || self.modified.contains(rel) || self.removed.contains(rel) {
            return true;
        }
        [&self.added, &self.modified, &self.removed]
            .into_iter()
            .any(|set| set_has_descendant(set, rel))
    }

    /// Directories (below `dir`) that contain at least one changed file.
    pub fn changed_dirs_within(&self, dir: &str) -> BTreeSet<String> {
        let mut dirs = BTreeSet::new();
        for rel in self.changed().filter(|rel| is_within(rel, dir)) {
            for ancestor in ancestors(rel) {
                if ancestor.len() <= dir.len() {
                    break;
                }
                dirs.insert(ancestor.to_string());
            }
        }
        dirs
    }
}

fn set_has_descendant(set: &BTreeSet<String>, dir: &str) -> bool {
    if dir.is_empty() {
        return !set.is_empty();
    }
    let prefix = format!("{dir}/");
    set.range(prefix.clone()..)
        .next()
        .is_some_and(|first| first.starts_with(&prefix))
}
