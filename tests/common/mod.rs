#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use buildctx::config::ContextConfig;
use buildctx::fs::mock::MockFileSystem;
use buildctx::store::MemoryStateStore;
use buildctx::BuildContext;

pub use buildctx_test_utils::{init_tracing, ConfigBuilder, Project};

pub type TestResult = Result<(), Box<dyn std::error::Error>>;

pub const BASE: &str = "/project";

/// Open a context over the mock filesystem rooted at [`BASE`], sharing
/// `store` with any other context opened on it.
pub fn open_mock(fs: &MockFileSystem, store: &MemoryStateStore) -> BuildContext {
    open_mock_with(fs, store, &ContextConfig::default())
}

pub fn open_mock_with(
    fs: &MockFileSystem,
    store: &MemoryStateStore,
    cfg: &ContextConfig,
) -> BuildContext {
    BuildContext::with_parts(
        Path::new(BASE),
        cfg,
        Arc::new(fs.clone()),
        Box::new(store.clone()),
    )
    .expect("opening mock build context")
}

pub fn mock_path(rel: &str) -> std::path::PathBuf {
    Path::new(BASE).join(rel)
}
