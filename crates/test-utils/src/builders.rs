#![allow(dead_code)]

use buildctx::config::{ContextConfig, RawContextConfig};
use buildctx::types::{FingerprintPolicy, StorageMode};

/// Builder for `ContextConfig` to simplify test setup.
pub struct ConfigBuilder {
    config: RawContextConfig,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: RawContextConfig::default(),
        }
    }

    pub fn state_dir(mut self, dir: &str) -> Self {
        self.config.context.state_dir = dir.to_string();
        self
    }

    pub fn storage(mut self, mode: StorageMode) -> Self {
        self.config.context.storage = mode;
        self
    }

    pub fn fingerprint(mut self, policy: FingerprintPolicy) -> Self {
        self.config.context.fingerprint = policy;
        self
    }

    pub fn with_snapshot_exclude(mut self, pattern: &str) -> Self {
        self.config.snapshot.exclude.push(pattern.to_string());
        self
    }

    pub fn with_default_exclude(mut self, pattern: &str) -> Self {
        self.config.scan.default_excludes.push(pattern.to_string());
        self
    }

    pub fn build(self) -> ContextConfig {
        ContextConfig::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
