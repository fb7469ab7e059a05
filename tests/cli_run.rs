mod common;
use crate::common::{init_tracing, Project, TestResult};

use std::path::Path;

use buildctx::cli::{CliArgs, Command, LogLevel};
use buildctx::errors::BuildContextError;
use buildctx::logging::env_filter;
use buildctx::{run, BuildOutcome, ContextConfig};
use clap::Parser;
use tracing_subscriber::filter::LevelFilter;

fn args(base_dir: &Path, command: Command) -> CliArgs {
    CliArgs {
        base_dir: base_dir.to_path_buf(),
        config: None,
        log_level: None,
        command,
    }
}

#[test]
fn commit_then_status_and_clean() -> TestResult {
    init_tracing();

    let project = Project::new()?;
    project.write("src/a.txt", "a")?;
    let cfg = ContextConfig::default();

    run(args(project.root(), Command::Commit))?;
    assert!(project.path(".buildctx").is_dir());

    let ctx = project.open(&cfg)?;
    assert!(ctx.is_incremental());
    assert!(ctx.delta().is_empty());
    ctx.discard();

    // Read-only commands leave the recorded baseline alone.
    project.write("src/a.txt", "a, edited")?;
    run(args(project.root(), Command::Status))?;
    run(args(project.root(), Command::Messages))?;
    run(args(
        project.root(),
        Command::Scan {
            all: false,
            deleted: false,
            includes: vec!["**/*.txt".to_string()],
            excludes: Vec::new(),
        },
    ))?;

    let ctx = project.open(&cfg)?;
    assert!(ctx.has_delta("src/a.txt"));
    ctx.finish(BuildOutcome::Success)?;

    run(args(project.root(), Command::Clean))?;
    let ctx = project.open(&cfg)?;
    assert!(!ctx.is_incremental());
    ctx.discard();
    Ok(())
}

#[test]
fn config_file_in_base_dir_is_picked_up() -> TestResult {
    init_tracing();

    let project = Project::new()?;
    project.write("a.txt", "a")?;
    project.write("buildctx.toml", "[context]\nstate_dir = \"cache/state\"\n")?;

    run(args(project.root(), Command::Commit))?;
    assert!(project.path("cache/state").is_dir());
    assert!(!project.path(".buildctx").exists());
    Ok(())
}

#[test]
fn explicit_missing_config_is_an_error() -> TestResult {
    init_tracing();

    let project = Project::new()?;
    let mut cli = args(project.root(), Command::Status);
    cli.config = Some(project.path("nope.toml"));

    assert!(matches!(run(cli), Err(BuildContextError::IoError(_))));
    Ok(())
}

#[test]
fn command_line_is_parsed() -> TestResult {
    let cli = CliArgs::try_parse_from([
        "buildctx",
        "--base-dir",
        "/work",
        "--log-level",
        "debug",
        "scan",
        "--deleted",
        "--include",
        "**/*.rs",
        "--include",
        "*.toml",
    ])?;
    assert_eq!(cli.base_dir, Path::new("/work"));
    assert!(matches!(cli.log_level, Some(LogLevel::Debug)));
    match cli.command {
        Command::Scan {
            all,
            deleted,
            includes,
            excludes,
        } => {
            assert!(!all);
            assert!(deleted);
            assert_eq!(includes, vec!["**/*.rs", "*.toml"]);
            assert!(excludes.is_empty());
        }
        other => panic!("unexpected command {other:?}"),
    }

    assert!(CliArgs::try_parse_from(["buildctx", "scan", "--all", "--deleted"]).is_err());
    Ok(())
}

#[test]
fn log_level_flag_sets_the_filter() {
    assert_eq!(
        env_filter(Some(LogLevel::Debug)).max_level_hint(),
        Some(LevelFilter::DEBUG)
    );
    assert_eq!(
        env_filter(Some(LogLevel::Error)).max_level_hint(),
        Some(LevelFilter::ERROR)
    );
}
