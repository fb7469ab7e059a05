// src/messages.rs

//! File-scoped diagnostics carried across builds.

use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Message severity. The numeric values are stable and appear in persisted
/// state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Severity {
    Warning = 1,
    Error = 2,
}

pub const SEVERITY_WARNING: u8 = Severity::Warning as u8;
pub const SEVERITY_ERROR: u8 = Severity::Error as u8;

impl From<Severity> for u8 {
    fn from(severity: Severity) -> Self {
        severity as u8
    }
}

impl TryFrom<u8> for Severity {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, String> {
        match value {
            SEVERITY_WARNING => Ok(Severity::Warning),
            SEVERITY_ERROR => Ok(Severity::Error),
            other => Err(format!("unknown severity {other} (expected 1 or 2)")),
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => f.write_str("WARNING"),
            Severity::Error => f.write_str("ERROR"),
        }
    }
}

/// One diagnostic attached to a location in a file.
///
/// `line` and `column` are 1-based; 0 means unknown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub file: PathBuf,
    pub line: u32,
    pub column: u32,
    pub text: String,
    pub severity: Severity,
    /// The cause's display chain, flattened to text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}:{}:{}: {}",
            self.severity,
            self.file.display(),
            self.line,
            self.column,
            self.text
        )?;
        if let Some(cause) = &self.cause {
            write!(f, " (caused by: {cause})")?;
        }
        Ok(())
    }
}

/// Flatten an error and its sources into `outer: inner: innermost`.
pub fn summarize_cause(cause: &(dyn StdError + 'static)) -> String {
    let mut parts = vec![cause.to_string()];
    let mut source = cause.source();
    while let Some(err) = source {
        parts.push(err.to_string());
        source = err.source();
    }
    parts.join(": ")
}

pub type MessageMap = BTreeMap<PathBuf, Vec<Message>>;

/// Two-generation diagnostics registry.
///
/// Messages loaded from the previous build are `carried`; messages added
/// during this build go to `current`. [`MessageRegistry::remove_messages`]
/// only ever touches the carried generation.
#[derive(Debug, Clone, Default)]
pub struct MessageRegistry {
    carried: MessageMap,
    current: MessageMap,
}

impl MessageRegistry {
    pub fn new(carried: MessageMap) -> Self {
        Self {
            carried,
            current: MessageMap::new(),
        }
    }

    pub fn add(&mut self, message: Message) {
        debug!(file = ?message.file, severity = %message.severity, "adding message");
        self.current
            .entry(message.file.clone())
            .or_default()
            .push(message);
    }

    /// Drop messages for exactly `file` that were carried over from a
    /// previous build. Returns how many were removed.
    pub fn remove_messages(&mut self, file: &Path) -> usize {
        let removed = self.carried.remove(file).map_or(0, |v| v.len());
        if removed > 0 {
            debug!(?file, removed, "removed carried-over messages");
        }
        removed
    }

    /// Messages for one file: carried first, then this build's, each in
    /// insertion order.
    pub fn messages_for(&self, file: &Path) -> Vec<&Message> {
        self.carried
            .get(file)
            .into_iter()
            .chain(self.current.get(file))
            .flatten()
            .collect()
    }

    /// Merged view of both generations, as exposed to the host and persisted.
    pub fn merged(&self) -> MessageMap {
        let mut merged = self.carried.clone();
        for (file, messages) in &self.current {
            merged
                .entry(file.clone())
                .or_default()
                .extend(messages.iter().cloned());
        }
        merged
    }

    pub fn has_errors(&self) -> bool {
        self.carried
            .values()
            .chain(self.current.values())
            .flatten()
            .any(|m| m.severity == Severity::Error)
    }
}
