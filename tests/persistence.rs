mod common;
use crate::common::{
    init_tracing, mock_path, open_mock, open_mock_with, ConfigBuilder, Project, TestResult, BASE,
};

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};

use buildctx::fs::mock::MockFileSystem;
use buildctx::fs::{FileSystem, RealFileSystem};
use buildctx::snapshot::base_dir_key;
use buildctx::store::{FileStateStore, MemoryStateStore, StateStore, STATE_VERSION};
use buildctx::{BuildContext, BuildOutcome, ContextConfig, FingerprintPolicy};

fn state_file(project: &Project) -> std::path::PathBuf {
    let store = FileStateStore::new(
        Arc::new(RealFileSystem),
        &project.path(".buildctx"),
        project.root(),
    );
    store.path().to_path_buf()
}

#[test]
fn persist_replaces_state_atomically() -> TestResult {
    init_tracing();

    let project = Project::new()?;
    project.write("a.txt", "a")?;
    let cfg = ContextConfig::default();

    project.open(&cfg)?.finish(BuildOutcome::Success)?;
    project.open(&cfg)?.finish(BuildOutcome::Success)?;

    let entries: Vec<String> = fs::read_dir(project.path(".buildctx"))?
        .map(|e| e.map(|e| e.file_name().to_string_lossy().into_owned()))
        .collect::<Result<_, _>>()?;
    assert_eq!(entries, vec![format!("{}.json", base_dir_key(project.root()))]);

    let raw: serde_json::Value = serde_json::from_slice(&fs::read(state_file(&project))?)?;
    assert_eq!(raw["version"], serde_json::json!(STATE_VERSION));
    Ok(())
}

#[test]
fn corrupt_state_degrades_to_full_build() -> TestResult {
    init_tracing();

    let project = Project::new()?;
    project.write("a.txt", "a")?;
    let cfg = ContextConfig::default();

    project.open(&cfg)?.finish(BuildOutcome::Success)?;
    fs::write(state_file(&project), b"{ not json")?;

    let ctx = project.open(&cfg)?;
    assert!(!ctx.is_incremental());
    assert!(ctx.has_delta("a.txt"));
    ctx.finish(BuildOutcome::Success)?;

    // The next build recovers.
    let ctx = project.open(&cfg)?;
    assert!(ctx.is_incremental());
    assert!(!ctx.has_delta("a.txt"));
    ctx.discard();
    Ok(())
}

#[test]
fn unknown_format_version_is_ignored() -> TestResult {
    init_tracing();

    let project = Project::new()?;
    project.write("a.txt", "a")?;
    let cfg = ContextConfig::default();

    let mut ctx = project.open(&cfg)?;
    ctx.set_value("k", "v")?;
    ctx.finish(BuildOutcome::Success)?;

    let path = state_file(&project);
    let mut raw: serde_json::Value = serde_json::from_slice(&fs::read(&path)?)?;
    raw["version"] = serde_json::json!(STATE_VERSION + 1);
    fs::write(&path, serde_json::to_vec(&raw)?)?;

    let ctx = project.open(&cfg)?;
    assert!(!ctx.is_incremental());
    assert_eq!(ctx.get_value::<String>("k"), None);
    ctx.discard();
    Ok(())
}

#[test]
fn state_is_scoped_to_its_base_directory() -> TestResult {
    init_tracing();

    let fs = MockFileSystem::new();
    let store = MemoryStateStore::new();
    fs.add_file("/one/a.txt", "a");
    fs.add_file("/two/a.txt", "a");
    let cfg = ContextConfig::default();

    let open = |base: &str| {
        BuildContext::with_parts(
            Path::new(base),
            &cfg,
            Arc::new(fs.clone()),
            Box::new(store.clone()),
        )
    };

    open("/one")?.finish(BuildOutcome::Success)?;
    let ctx = open("/two")?;
    assert!(!ctx.is_incremental());
    ctx.discard();

    assert_ne!(base_dir_key(Path::new("/one")), base_dir_key(Path::new("/two")));
    Ok(())
}

#[test]
fn changing_fingerprint_policy_forces_full_build() -> TestResult {
    init_tracing();

    let fs = MockFileSystem::new();
    let store = MemoryStateStore::new();
    fs.add_file(mock_path("a.txt"), "a");

    open_mock(&fs, &store).finish(BuildOutcome::Success)?;

    let content = ConfigBuilder::new()
        .fingerprint(FingerprintPolicy::Content)
        .build();
    let ctx = open_mock_with(&fs, &store, &content);
    assert!(!ctx.is_incremental());
    ctx.finish(BuildOutcome::Success)?;

    assert!(open_mock_with(&fs, &store, &content).is_incremental());
    Ok(())
}

#[test]
fn content_fingerprints_ignore_mtime_only_changes() -> TestResult {
    init_tracing();

    let fs = MockFileSystem::new();
    fs.add_file(mock_path("a.txt"), "same bytes");
    let touch = || fs.set_modified(mock_path("a.txt"), UNIX_EPOCH + Duration::from_secs(99_999));

    let content = ConfigBuilder::new()
        .fingerprint(FingerprintPolicy::Content)
        .build();
    let by_content = MemoryStateStore::new();
    let by_metadata = MemoryStateStore::new();

    open_mock_with(&fs, &by_content, &content).finish(BuildOutcome::Success)?;
    open_mock(&fs, &by_metadata).finish(BuildOutcome::Success)?;
    touch();

    let ctx = open_mock_with(&fs, &by_content, &content);
    assert!(!ctx.has_delta("a.txt"));
    ctx.discard();

    let ctx = open_mock(&fs, &by_metadata);
    assert!(ctx.has_delta("a.txt"));
    ctx.discard();
    Ok(())
}

#[test]
fn failed_build_keeps_its_inputs_changed() -> TestResult {
    init_tracing();

    let fs = MockFileSystem::new();
    let store = MemoryStateStore::new();
    fs.add_file(mock_path("a.txt"), "a");
    fs.add_file(mock_path("b.txt"), "b");

    open_mock(&fs, &store).finish(BuildOutcome::Success)?;
    fs.add_file(mock_path("b.txt"), "b2");

    let mut ctx = open_mock(&fs, &store);
    assert!(ctx.has_delta("b.txt"));
    ctx.set_value("progress", &1)?;
    ctx.finish(BuildOutcome::Failure)?;

    let ctx = open_mock(&fs, &store);
    assert!(ctx.has_delta("b.txt"));
    assert!(!ctx.has_delta("a.txt"));
    assert_eq!(ctx.get_value::<i32>("progress"), Some(1));
    ctx.finish(BuildOutcome::Success)?;

    let ctx = open_mock(&fs, &store);
    assert!(!ctx.has_delta("b.txt"));
    ctx.discard();
    Ok(())
}

#[test]
fn failed_build_keeps_deletions_pending() -> TestResult {
    init_tracing();

    let fs = MockFileSystem::new();
    let store = MemoryStateStore::new();
    fs.add_file(mock_path("a.txt"), "a");
    fs.add_file(mock_path("gone.txt"), "g");

    open_mock(&fs, &store).finish(BuildOutcome::Success)?;
    fs.remove(mock_path("gone.txt"));

    let mut ctx = open_mock(&fs, &store);
    assert_eq!(ctx.new_delete_scanner(Path::new(".")).scan()?.files, vec!["gone.txt"]);
    ctx.refresh(Path::new("gone.txt"));
    ctx.finish(BuildOutcome::Failure)?;

    // The failed build never cleaned up after gone.txt; it gets another chance.
    let ctx = open_mock(&fs, &store);
    assert!(ctx.has_delta("gone.txt"));
    assert!(!ctx.has_delta("a.txt"));
    assert_eq!(ctx.new_delete_scanner(Path::new(".")).scan()?.files, vec!["gone.txt"]);
    ctx.finish(BuildOutcome::Success)?;

    let ctx = open_mock(&fs, &store);
    assert!(!ctx.has_delta("gone.txt"));
    assert!(ctx.new_delete_scanner(Path::new(".")).scan()?.is_empty());
    ctx.discard();
    Ok(())
}

#[test]
fn failed_persist_leaves_previous_state_loadable() -> TestResult {
    init_tracing();

    let fs = MockFileSystem::new();
    fs.add_file(mock_path("a.txt"), "a");
    let cfg = ContextConfig::default();
    let state_dir = mock_path(".buildctx");

    let open = || {
        let store = FileStateStore::new(Arc::new(fs.clone()), &state_dir, Path::new(BASE));
        BuildContext::with_parts(Path::new(BASE), &cfg, Arc::new(fs.clone()), Box::new(store))
    };

    let mut ctx = open()?;
    ctx.set_value("generation", &1)?;
    ctx.finish(BuildOutcome::Success)?;

    fs.add_file(mock_path("a.txt"), "a, edited");
    fs.fail_renames(true);
    let mut ctx = open()?;
    assert!(ctx.has_delta("a.txt"));
    ctx.set_value("generation", &2)?;
    assert!(ctx.finish(BuildOutcome::Success).is_err());
    fs.fail_renames(false);

    // Only the previous record is left; the temp file was cleaned up.
    let entries = fs.read_dir(&state_dir)?;
    assert_eq!(entries.len(), 1);
    assert!(entries[0].extension().is_some_and(|ext| ext == "json"));

    let ctx = open()?;
    assert!(ctx.is_incremental());
    assert!(ctx.has_delta("a.txt"));
    assert_eq!(ctx.get_value::<i32>("generation"), Some(1));
    ctx.discard();
    Ok(())
}

#[test]
fn dropped_context_persists_as_failed_build() -> TestResult {
    init_tracing();

    let fs = MockFileSystem::new();
    let store = MemoryStateStore::new();
    fs.add_file(mock_path("a.txt"), "a");

    {
        let mut ctx = open_mock(&fs, &store);
        ctx.set_value("seen", &true)?;
    }

    assert!(store.load()?.is_some());
    let ctx = open_mock(&fs, &store);
    assert!(ctx.is_incremental());
    assert!(ctx.has_delta("a.txt"));
    assert_eq!(ctx.get_value::<bool>("seen"), Some(true));
    ctx.discard();
    Ok(())
}

#[test]
fn discarded_context_persists_nothing() -> TestResult {
    init_tracing();

    let fs = MockFileSystem::new();
    let store = MemoryStateStore::new();
    fs.add_file(mock_path("a.txt"), "a");

    open_mock(&fs, &store).discard();
    assert!(store.load()?.is_none());
    Ok(())
}

#[test]
fn missing_base_directory_is_an_error() {
    init_tracing();

    let fs = MockFileSystem::new();
    let result = BuildContext::with_parts(
        Path::new("/nope"),
        &ContextConfig::default(),
        Arc::new(fs),
        Box::new(MemoryStateStore::new()),
    );
    assert!(result.is_err());
}
