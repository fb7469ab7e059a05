mod common;
use crate::common::{init_tracing, mock_path, open_mock, Project, TestResult, BASE};

use std::fs;
use std::io::Write;
use std::path::Path;

use buildctx::fs::mock::MockFileSystem;
use buildctx::fs::FileSystem;
use buildctx::store::MemoryStateStore;
use buildctx::{BuildOutcome, ContextConfig};

#[test]
fn identical_rewrite_keeps_mtime_and_stays_out_of_next_delta() -> TestResult {
    init_tracing();

    let project = Project::new()?;
    project.write("src/in.txt", "input")?;
    let cfg = ContextConfig::default();
    let target = project.path("out/generated.txt");

    // Build 1 creates the output (and its parent directory).
    let mut ctx = project.open(&cfg)?;
    let mut out = ctx.new_file_output(&target)?;
    out.write_all(b"generated ")?;
    out.write_all(b"content")?;
    assert!(out.close()?);
    ctx.finish(BuildOutcome::Success)?;

    assert_eq!(fs::read_to_string(&target)?, "generated content");
    let first_mtime = project.mtime("out/generated.txt")?;

    // Build 2 writes the same bytes: nothing is touched.
    let mut ctx = project.open(&cfg)?;
    assert!(!ctx.has_delta_file(&target));
    let mut out = ctx.new_file_output(&target)?;
    out.write_all(b"generated content")?;
    assert!(!out.close()?);
    ctx.finish(BuildOutcome::Success)?;

    assert_eq!(project.mtime("out/generated.txt")?, first_mtime);

    // Build 3 still sees no change to the output.
    let ctx = project.open(&cfg)?;
    assert!(!ctx.has_delta("out/generated.txt"));
    assert!(!ctx.has_delta("out"));
    ctx.discard();
    Ok(())
}

#[test]
fn different_content_is_written_and_recorded() -> TestResult {
    init_tracing();

    let fs = MockFileSystem::new();
    let store = MemoryStateStore::new();
    fs.add_file(mock_path("out.txt"), "v1");

    open_mock(&fs, &store).finish(BuildOutcome::Success)?;

    let mut ctx = open_mock(&fs, &store);
    let mut out = ctx.new_file_output(Path::new("out.txt"))?;
    out.write_all(b"v2")?;
    assert!(out.close()?);
    // The current build's delta is fixed at start.
    assert!(!ctx.has_delta("out.txt"));
    ctx.finish(BuildOutcome::Success)?;

    assert_eq!(fs.read(&mock_path("out.txt"))?, b"v2");

    // The writer refreshed the file, so the next build does not see a change.
    let ctx = open_mock(&fs, &store);
    assert!(!ctx.has_delta("out.txt"));
    ctx.discard();
    Ok(())
}

#[test]
fn empty_output_creates_missing_file() -> TestResult {
    init_tracing();

    let fs = MockFileSystem::new();
    let store = MemoryStateStore::new();
    fs.add_dir(BASE);

    let mut ctx = open_mock(&fs, &store);
    let out = ctx.new_file_output(Path::new("empty.txt"))?;
    assert!(out.close()?);
    assert!(fs.is_file(&mock_path("empty.txt")));

    let out = ctx.new_file_output(Path::new("empty.txt"))?;
    assert!(!out.close()?);

    ctx.discard();
    Ok(())
}

#[test]
fn dropping_an_unclosed_output_commits_it() -> TestResult {
    init_tracing();

    let fs = MockFileSystem::new();
    let store = MemoryStateStore::new();
    fs.add_file(mock_path("src/a.txt"), "a");

    let mut ctx = open_mock(&fs, &store);
    {
        let mut out = ctx.new_file_output(Path::new("gen/b.txt"))?;
        out.write_all(b"from drop")?;
    }
    ctx.finish(BuildOutcome::Success)?;

    assert_eq!(fs.read(&mock_path("gen/b.txt"))?, b"from drop");

    let ctx = open_mock(&fs, &store);
    assert!(!ctx.has_delta("gen/b.txt"));
    ctx.discard();
    Ok(())
}

#[test]
fn output_to_a_directory_is_an_error() -> TestResult {
    init_tracing();

    let fs = MockFileSystem::new();
    let store = MemoryStateStore::new();
    fs.add_file(mock_path("dir/a.txt"), "a");

    let mut ctx = open_mock(&fs, &store);
    assert!(ctx.new_file_output(Path::new("dir")).is_err());
    ctx.discard();
    Ok(())
}

#[test]
fn refresh_only_affects_the_next_build() -> TestResult {
    init_tracing();

    let fs = MockFileSystem::new();
    let store = MemoryStateStore::new();
    fs.add_file(mock_path("gen/refreshed.txt"), "1");
    fs.add_file(mock_path("gen/unrefreshed.txt"), "1");

    open_mock(&fs, &store).finish(BuildOutcome::Success)?;

    // Build 2 rewrites both files behind the context's back; only one is
    // refreshed.
    let mut ctx = open_mock(&fs, &store);
    fs.add_file(mock_path("gen/refreshed.txt"), "22");
    fs.add_file(mock_path("gen/unrefreshed.txt"), "22");
    ctx.refresh(&mock_path("gen/refreshed.txt"));
    ctx.refresh(Path::new("/somewhere/else.txt"));

    assert!(!ctx.has_delta("gen/refreshed.txt"));
    assert!(!ctx.has_delta("gen/unrefreshed.txt"));
    ctx.finish(BuildOutcome::Success)?;

    let ctx = open_mock(&fs, &store);
    assert!(!ctx.has_delta("gen/refreshed.txt"));
    assert!(ctx.has_delta("gen/unrefreshed.txt"));
    ctx.discard();
    Ok(())
}

#[test]
fn refreshing_a_deleted_file_drops_it_from_the_snapshot() -> TestResult {
    init_tracing();

    let fs = MockFileSystem::new();
    let store = MemoryStateStore::new();
    fs.add_file(mock_path("keep.txt"), "k");
    fs.add_file(mock_path("gone.txt"), "g");

    open_mock(&fs, &store).finish(BuildOutcome::Success)?;

    let mut ctx = open_mock(&fs, &store);
    fs.remove(mock_path("gone.txt"));
    ctx.refresh(Path::new("gone.txt"));
    ctx.finish(BuildOutcome::Success)?;

    // The deletion was recorded, so it is not reported again.
    let ctx = open_mock(&fs, &store);
    assert!(ctx.delta().is_empty());
    assert!(ctx.new_delete_scanner(Path::new(".")).scan()?.is_empty());
    ctx.discard();
    Ok(())
}
