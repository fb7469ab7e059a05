// src/context.rs

//! The per-build aggregate: delta queries, scanners, value and message
//! registries, and the persist step that hands everything to the next build.

use std::collections::BTreeSet;
use std::error::Error as StdError;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::ContextConfig;
use crate::delta::DeltaSet;
use crate::errors::{BuildContextError, Result};
use crate::fs::{FileSystem, RealFileSystem};
use crate::messages::{summarize_cause, Message, MessageMap, MessageRegistry, Severity};
use crate::output::FileOutput;
use crate::paths::{ancestors, is_within, normalize, normalize_rel, relative_str, strip_dir};
use crate::patterns::PathFilter;
use crate::scanner::{ScanSource, Scanner};
use crate::snapshot::{capture, Fingerprint, Snapshot, TrackingRules};
use crate::state::StateRegistry;
use crate::store::{FileStateStore, MemoryStateStore, PersistedState, StateStore, STATE_VERSION};
use crate::types::{BuildOutcome, FingerprintPolicy, StorageMode};

/// Incremental build context for one base directory and one build.
///
/// Created at the start of a build, it loads what the previous build
/// persisted, walks the base directory once and fixes the delta for the
/// rest of the build. [`BuildContext::finish`] persists the state for the
/// next build; dropping an unfinished context persists it as a failed build.
///
/// Not internally synchronised. Hosts running build steps in parallel must
/// serialise access.
pub struct BuildContext {
    base_dir: PathBuf,
    fs: Arc<dyn FileSystem>,
    store: Box<dyn StateStore>,
    policy: FingerprintPolicy,
    rules: TrackingRules,
    default_excludes: Vec<String>,
    incremental: bool,
    current: Snapshot,
    /// Previous fingerprints of files deleted since the last build.
    vanished: Snapshot,
    delta: DeltaSet,
    refreshed: BTreeSet<String>,
    values: StateRegistry,
    messages: MessageRegistry,
    finished: bool,
}

impl BuildContext {
    /// Open a context on the real filesystem, with the store selected by
    /// `cfg`.
    pub fn open(base_dir: impl Into<PathBuf>, cfg: &ContextConfig) -> Result<Self> {
        let mut base_dir = base_dir.into();
        if base_dir.is_relative() {
            base_dir = std::env::current_dir()?.join(base_dir);
        }
        let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
        let base_dir = fs.canonicalize(&base_dir).unwrap_or_else(|_| normalize(&base_dir));

        let store: Box<dyn StateStore> = match cfg.storage() {
            StorageMode::File => Box::new(FileStateStore::new(
                fs.clone(),
                &base_dir.join(cfg.state_dir()),
                &base_dir,
            )),
            StorageMode::Memory => Box::new(MemoryStateStore::new()),
        };

        Self::with_parts(base_dir, cfg, fs, store)
    }

    /// Open a context with an explicit filesystem and state store.
    pub fn with_parts(
        base_dir: impl Into<PathBuf>,
        cfg: &ContextConfig,
        fs: Arc<dyn FileSystem>,
        store: Box<dyn StateStore>,
    ) -> Result<Self> {
        let base_dir = normalize(&base_dir.into());
        if !fs.is_dir(&base_dir) {
            return Err(BuildContextError::IoError(io::Error::new(
                io::ErrorKind::NotFound,
                format!("base directory {:?} is not a directory", base_dir),
            )));
        }

        let policy = cfg.fingerprint();
        let rules = TrackingRules {
            state_dir: normalize_rel(cfg.state_dir()),
            filter: PathFilter::excluding(&cfg.snapshot_section().exclude)?,
        };

        let prior = load_prior(store.as_ref(), &base_dir, policy);
        let current = capture(fs.as_ref(), &base_dir, &rules, policy)?;
        let incremental = prior.is_some();

        let (delta, vanished, values, messages) = match prior {
            Some(prior) => {
                let delta = DeltaSet::compute(&prior.snapshot, &current);
                let vanished = vanished_entries(&prior.snapshot, &delta);
                (
                    delta,
                    vanished,
                    StateRegistry::new(prior.values),
                    MessageRegistry::new(prior.messages),
                )
            }
            None => (
                DeltaSet::compute(&Snapshot::new(), &current),
                Snapshot::new(),
                StateRegistry::default(),
                MessageRegistry::default(),
            ),
        };

        info!(
            ?base_dir,
            incremental,
            tracked = current.len(),
            added = delta.added().len(),
            modified = delta.modified().len(),
            removed = delta.removed().len(),
            "opened build context"
        );

        Ok(Self {
            base_dir,
            fs,
            store,
            policy,
            rules,
            default_excludes: cfg.scan_section().default_excludes.clone(),
            incremental,
            current,
            vanished,
            delta,
            refreshed: BTreeSet::new(),
            values,
            messages,
            finished: false,
        })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub(crate) fn file_system(&self) -> Arc<dyn FileSystem> {
        self.fs.clone()
    }

    /// True if a usable snapshot from a previous build was found.
    pub fn is_incremental(&self) -> bool {
        self.incremental
    }

    /// The delta fixed at the start of this build.
    pub fn delta(&self) -> &DeltaSet {
        &self.delta
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_relative() {
            normalize(&self.base_dir.join(path))
        } else {
            normalize(path)
        }
    }

    /// Relative form of `path`, or `None` if it lies outside the base
    /// directory. Relative inputs are resolved against the base directory.
    fn relative(&self, path: &Path) -> Option<String> {
        relative_str(self.fs.as_ref(), &self.base_dir, &self.resolve(path))
    }

    // ----- delta queries -------------------------------------------------

    /// True if the file or folder at `relpath` changed since the last build.
    ///
    /// Always true for non-incremental builds. Paths escaping the base
    /// directory and untracked paths (state directory, snapshot excludes)
    /// also count as changed. A folder counts as changed when anything
    /// below it is.
    pub fn has_delta(&self, relpath: &str) -> bool {
        if !self.incremental {
            return true;
        }
        match normalize_rel(relpath) {
            Some(rel) if self.is_tracked(&rel) => self.delta.touches(&rel),
            _ => true,
        }
    }

    /// Whether changes to `rel` are recorded in snapshots at all. Files in
    /// the state directory or matched by `[snapshot].exclude` are not.
    fn is_tracked(&self, rel: &str) -> bool {
        let in_state_dir = self
            .rules
            .state_dir
            .as_deref()
            .is_some_and(|state| is_within(rel, state));
        !in_state_dir && self.rules.tracks(rel)
    }

    /// Like [`BuildContext::has_delta`], for a path that may lie outside the
    /// base directory (in which case it is reported as changed).
    pub fn has_delta_file(&self, file: &Path) -> bool {
        match self.relative(file) {
            Some(rel) => self.has_delta(&rel),
            None => true,
        }
    }

    /// True if any of `relpaths` changed.
    pub fn has_delta_any<I, S>(&self, relpaths: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        relpaths.into_iter().any(|rel| self.has_delta(rel.as_ref()))
    }

    /// True when both files exist, neither changed since the last build and
    /// `target` was modified strictly later than `source`.
    pub fn is_uptodate(&self, target: &Path, source: &Path) -> bool {
        let target = self.resolve(target);
        let source = self.resolve(source);

        if !self.fs.is_file(&target) || !self.fs.is_file(&source) {
            return false;
        }
        // Untracked files (excluded outputs, typically) fall through to the
        // timestamp comparison.
        let touched = |path: &Path| match self.relative(path) {
            Some(rel) => !self.incremental || self.delta.touches(&rel),
            None => true,
        };
        if touched(target.as_path()) || touched(source.as_path()) {
            return false;
        }

        match (self.fs.metadata(&target), self.fs.metadata(&source)) {
            (Ok(t), Ok(s)) => t.modified > s.modified,
            _ => false,
        }
    }

    // ----- outputs ---------------------------------------------------------

    /// Note that `file` may have been modified during this build.
    ///
    /// The delta for this build is unaffected; the file's state is recorded
    /// when the context is finished.
    pub fn refresh(&mut self, file: &Path) {
        match self.relative(file) {
            Some(rel) if !rel.is_empty() => {
                debug!(%rel, "refreshed");
                self.refreshed.insert(rel);
            }
            _ => debug!(?file, "refresh outside base directory ignored"),
        }
    }

    /// Content-aware output stream for `file`. See [`FileOutput`].
    pub fn new_file_output(&mut self, file: &Path) -> Result<FileOutput<'_>> {
        let path = self.resolve(file);
        if self.fs.is_dir(&path) {
            return Err(BuildContextError::IoError(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{:?} is a directory", path),
            )));
        }
        Ok(FileOutput::new(self, path))
    }

    // ----- scanners --------------------------------------------------------

    /// Same as `new_scanner_with(basedir, false)`.
    pub fn new_scanner(&self, basedir: &Path) -> Scanner {
        self.new_scanner_with(basedir, false)
    }

    /// Scanner over `basedir`.
    ///
    /// With `ignore_delta = false` on an incremental build only changed or
    /// added files (and the folders holding them) are reported. Such a
    /// scanner knows nothing about stale or deleted *targets*; for
    /// source-to-target processing prefer `ignore_delta = true` together
    /// with [`BuildContext::is_uptodate`].
    ///
    /// Empty if `basedir` is outside the base directory.
    pub fn new_scanner_with(&self, basedir: &Path, ignore_delta: bool) -> Scanner {
        let path = self.resolve(basedir);
        let source = match self.relative(basedir) {
            None => ScanSource::Empty,
            Some(dir) if ignore_delta || !self.incremental => ScanSource::Walk {
                prune: self
                    .rules
                    .state_dir
                    .as_deref()
                    .filter(|state| is_within(state, &dir) && *state != dir)
                    .map(|state| strip_dir(state, &dir).to_string()),
            },
            Some(dir) => ScanSource::Listed {
                files: self
                    .delta
                    .changed()
                    .filter(|rel| is_within(rel, &dir) && *rel != dir)
                    .map(|rel| strip_dir(rel, &dir).to_string())
                    .collect(),
                directories: self
                    .delta
                    .changed_dirs_within(&dir)
                    .iter()
                    .map(|rel| strip_dir(rel, &dir).to_string())
                    .collect(),
            },
        };
        Scanner::new(self.fs.clone(), path, source, self.default_excludes.clone())
    }

    /// Scanner over files (and folders) under `basedir` that existed at the
    /// end of the previous build but are gone now.
    ///
    /// Empty for non-incremental builds and for `basedir` outside the base
    /// directory.
    pub fn new_delete_scanner(&self, basedir: &Path) -> Scanner {
        let path = self.resolve(basedir);
        let source = match self.relative(basedir) {
            Some(dir) if self.incremental => {
                let removed: Vec<&str> = self
                    .delta
                    .removed()
                    .iter()
                    .map(String::as_str)
                    .filter(|rel| is_within(rel, &dir) && *rel != dir)
                    .collect();
                let mut directories = BTreeSet::new();
                for rel in &removed {
                    for ancestor in ancestors(rel) {
                        if ancestor.len() <= dir.len() {
                            break;
                        }
                        if !self.fs.exists(&self.base_dir.join(ancestor)) {
                            directories.insert(strip_dir(ancestor, &dir).to_string());
                        }
                    }
                }
                ScanSource::Listed {
                    files: removed
                        .iter()
                        .map(|rel| strip_dir(rel, &dir).to_string())
                        .collect(),
                    directories,
                }
            }
            _ => ScanSource::Empty,
        };
        Scanner::new(self.fs.clone(), path, source, self.default_excludes.clone())
    }

    // ----- values ----------------------------------------------------------

    /// Store `value` under `key` for the next build. Not visible to
    /// [`BuildContext::get_value`] during this build.
    pub fn set_value<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> Result<()> {
        let value = serde_json::to_value(value)?;
        self.values.set(key, value);
        Ok(())
    }

    /// Value the previous build stored under `key`, if this build is
    /// incremental and it deserialises as `T`.
    pub fn get_value<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.get_raw_value(key)?;
        match serde_json::from_value(raw.clone()) {
            Ok(value) => Some(value),
            Err(e) => {
                debug!(%key, error = %e, "stored value has an unexpected shape");
                None
            }
        }
    }

    pub fn get_raw_value(&self, key: &str) -> Option<&Value> {
        if !self.incremental {
            return None;
        }
        self.values.get(key)
    }

    // ----- messages --------------------------------------------------------

    /// Attach a diagnostic to `file`. `line`/`column` are 1-based, 0 for
    /// unknown.
    pub fn add_message(
        &mut self,
        file: &Path,
        line: u32,
        column: u32,
        text: impl Into<String>,
        severity: Severity,
        cause: Option<&(dyn StdError + 'static)>,
    ) {
        let message = Message {
            file: self.resolve(file),
            line,
            column,
            text: text.into(),
            severity,
            cause: cause.map(summarize_cause),
        };
        self.messages.add(message);
    }

    #[deprecated(note = "use add_message with Severity::Warning")]
    pub fn add_warning(
        &mut self,
        file: &Path,
        line: u32,
        column: u32,
        text: impl Into<String>,
        cause: Option<&(dyn StdError + 'static)>,
    ) {
        self.add_message(file, line, column, text, Severity::Warning, cause);
    }

    #[deprecated(note = "use add_message with Severity::Error")]
    pub fn add_error(
        &mut self,
        file: &Path,
        line: u32,
        column: u32,
        text: impl Into<String>,
        cause: Option<&(dyn StdError + 'static)>,
    ) {
        self.add_message(file, line, column, text, Severity::Error, cause);
    }

    /// Remove messages a previous build attached to exactly `file`.
    /// Messages added during this build are kept.
    pub fn remove_messages(&mut self, file: &Path) {
        let file = self.resolve(file);
        self.messages.remove_messages(&file);
    }

    /// Messages currently attached to `file`.
    pub fn messages_for(&self, file: &Path) -> Vec<&Message> {
        self.messages.messages_for(&self.resolve(file))
    }

    /// All messages, as they will be persisted.
    pub fn messages(&self) -> MessageMap {
        self.messages.merged()
    }

    // ----- lifecycle -------------------------------------------------------

    /// End the build and persist state for the next one.
    pub fn finish(mut self, outcome: BuildOutcome) -> Result<()> {
        self.finished = true;
        self.persist(outcome)
    }

    /// End the build without persisting anything.
    pub fn discard(mut self) {
        self.finished = true;
        debug!(base_dir = ?self.base_dir, "build context discarded");
    }

    /// Remove the persisted state, so the next build is non-incremental.
    pub fn clear_state(&mut self) -> Result<()> {
        self.store.clear()?;
        Ok(())
    }

    fn next_snapshot(&self, outcome: BuildOutcome) -> Snapshot {
        let mut next = self.current.clone();

        // A failed build hands its whole delta to the next one: added and
        // modified files are forgotten, deleted files are remembered.
        let failed = outcome == BuildOutcome::Failure;
        if failed {
            for rel in self.delta.added().iter().chain(self.delta.modified()) {
                next.remove(rel);
            }
            for (rel, fingerprint) in self.vanished.iter() {
                next.insert(rel, fingerprint.clone());
            }
        }

        for rel in &self.refreshed {
            if !self.is_tracked(rel) || (failed && self.delta.touches(rel)) {
                continue;
            }
            let path = self.base_dir.join(rel);
            if !self.fs.is_file(&path) {
                next.remove(rel);
                continue;
            }
            match Fingerprint::of(self.fs.as_ref(), &path, self.policy) {
                Ok(fingerprint) => next.insert(rel.clone(), fingerprint),
                Err(e) => {
                    debug!(%rel, error = %e, "cannot fingerprint refreshed file");
                    next.remove(rel);
                }
            }
        }

        next
    }

    fn persist(&mut self, outcome: BuildOutcome) -> Result<()> {
        let state = PersistedState {
            version: STATE_VERSION,
            base_dir: self.base_dir.clone(),
            policy: self.policy,
            snapshot: self.next_snapshot(outcome),
            values: self.values.merged(),
            messages: self.messages.merged(),
        };
        self.store.persist(&state)?;
        info!(?outcome, files = state.snapshot.len(), "build state persisted");
        Ok(())
    }
}

impl Drop for BuildContext {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        if let Err(e) = self.persist(BuildOutcome::Failure) {
            warn!(base_dir = ?self.base_dir, error = %e, "failed to persist build state on drop");
        }
    }
}

/// Load the previous build's state, treating anything unusable as absent.
fn load_prior(
    store: &dyn StateStore,
    base_dir: &Path,
    policy: FingerprintPolicy,
) -> Option<PersistedState> {
    match store.load() {
        Ok(Some(state)) if state.version != STATE_VERSION => {
            info!(version = state.version, "ignoring state with unknown format version");
            None
        }
        Ok(Some(state)) if state.base_dir.as_path() != base_dir => {
            info!(stored = ?state.base_dir, "ignoring state recorded for another base directory");
            None
        }
        Ok(Some(state)) if state.policy != policy => {
            info!(stored = ?state.policy, current = ?policy, "fingerprint policy changed, full build");
            None
        }
        Ok(Some(state)) => Some(state),
        Ok(None) => None,
        Err(e) => {
            warn!(error = %e, "cannot load previous build state, falling back to full build");
            None
        }
    }
}

/// Prior fingerprints of the files `delta` reports as removed.
fn vanished_entries(prior: &Snapshot, delta: &DeltaSet) -> Snapshot {
    let mut vanished = Snapshot::new();
    for rel in delta.removed() {
        if let Some(fingerprint) = prior.get(rel) {
            vanished.insert(rel.as_str(), fingerprint.clone());
        }
    }
    vanished
}
