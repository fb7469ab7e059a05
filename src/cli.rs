// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Command-line arguments for `buildctx`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "buildctx",
    version,
    about = "Inspect and maintain incremental build state for a directory.",
    long_about = None
)]
pub struct CliArgs {
    /// Base directory whose files are tracked.
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub base_dir: PathBuf,

    /// Path to the config file (TOML).
    ///
    /// Default: `buildctx.toml` in the base directory, if present.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `BUILDCTX_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Show whether the next build is incremental and what changed.
    Status,

    /// List files a build would see, without recording anything.
    Scan {
        /// Ignore the delta and list everything.
        #[arg(long, conflicts_with = "deleted")]
        all: bool,

        /// List files deleted since the last build instead.
        #[arg(long)]
        deleted: bool,

        /// Only list paths matching these globs.
        #[arg(long = "include", value_name = "GLOB")]
        includes: Vec<String>,

        /// Skip paths matching these globs.
        #[arg(long = "exclude", value_name = "GLOB")]
        excludes: Vec<String>,
    },

    /// Print diagnostics recorded by previous builds.
    Messages,

    /// Record the current tree as the baseline for the next build.
    Commit,

    /// Remove persisted state; the next build is a full build.
    Clean,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
