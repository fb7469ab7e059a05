// src/lib.rs

//! Incremental build context.
//!
//! A [`BuildContext`] lets a build step skip unchanged work: it knows which
//! files under a base directory changed since the previous build, hands out
//! delta-filtered [`Scanner`]s, carries opaque values and file diagnostics
//! from one build to the next, and avoids rewriting outputs whose content
//! did not change.
//!
//! ```no_run
//! use std::io::Write;
//! use std::path::Path;
//!
//! use buildctx::{BuildContext, BuildOutcome, ContextConfig};
//!
//! # fn main() -> buildctx::errors::Result<()> {
//! let mut ctx = BuildContext::open("/work/project", &ContextConfig::default())?;
//! let changed = ctx.new_scanner(Path::new("src")).set_includes(["**/*.txt"]).scan()?;
//! for rel in &changed.files {
//!     let mut out = ctx.new_file_output(&Path::new("out").join(rel))?;
//!     out.write_all(b"generated")?;
//!     out.close()?;
//! }
//! ctx.finish(BuildOutcome::Success)?;
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod context;
pub mod delta;
pub mod errors;
pub mod fs;
pub mod logging;
pub mod messages;
pub mod output;
pub mod paths;
pub mod patterns;
pub mod scanner;
pub mod snapshot;
pub mod state;
pub mod store;
pub mod types;

use std::path::Path;

use tracing::debug;

use crate::cli::{CliArgs, Command};
use crate::config::{default_config_path, load_and_validate, load_or_default};
use crate::errors::Result;

pub use crate::config::ContextConfig;
pub use crate::context::BuildContext;
pub use crate::delta::DeltaSet;
pub use crate::messages::{Message, Severity, SEVERITY_ERROR, SEVERITY_WARNING};
pub use crate::output::FileOutput;
pub use crate::scanner::{ScanResult, Scanner};
pub use crate::types::{BuildOutcome, FingerprintPolicy, StorageMode};

/// High-level entry point used by `main.rs`.
pub fn run(args: CliArgs) -> Result<()> {
    let cfg = match &args.config {
        Some(path) => load_and_validate(path)?,
        None => load_or_default(default_config_path(&args.base_dir))?,
    };

    match args.command {
        Command::Status => {
            let ctx = BuildContext::open(&args.base_dir, &cfg)?;
            print_status(&ctx);
            ctx.discard();
        }
        Command::Scan {
            all,
            deleted,
            includes,
            excludes,
        } => {
            let ctx = BuildContext::open(&args.base_dir, &cfg)?;
            let base = ctx.base_dir().to_path_buf();
            let mut scanner = if deleted {
                ctx.new_delete_scanner(&base)
            } else {
                ctx.new_scanner_with(&base, all)
            };
            scanner
                .set_includes(includes)
                .set_excludes(excludes)
                .add_default_excludes();
            let result = scanner.scan()?;
            for dir in &result.directories {
                println!("{dir}/");
            }
            for file in &result.files {
                println!("{file}");
            }
            ctx.discard();
        }
        Command::Messages => {
            let ctx = BuildContext::open(&args.base_dir, &cfg)?;
            for message in ctx.messages().values().flatten() {
                println!("{message}");
            }
            ctx.discard();
        }
        Command::Commit => {
            let ctx = BuildContext::open(&args.base_dir, &cfg)?;
            ctx.finish(BuildOutcome::Success)?;
            println!("recorded baseline for {}", display_base(&args.base_dir));
        }
        Command::Clean => {
            let mut ctx = BuildContext::open(&args.base_dir, &cfg)?;
            ctx.clear_state()?;
            ctx.discard();
            println!("cleared build state for {}", display_base(&args.base_dir));
        }
    }

    debug!("command complete");
    Ok(())
}

fn display_base(base_dir: &Path) -> String {
    base_dir.display().to_string()
}

fn print_status(ctx: &BuildContext) {
    println!("buildctx status");
    println!("  base_dir = {}", ctx.base_dir().display());
    println!("  incremental = {}", ctx.is_incremental());

    let delta = ctx.delta();
    if !ctx.is_incremental() {
        println!("  no usable previous state: every file counts as changed");
        return;
    }
    if delta.is_empty() {
        println!("  no changes");
        return;
    }
    for rel in delta.added() {
        println!("  A {rel}");
    }
    for rel in delta.modified() {
        println!("  M {rel}");
    }
    for rel in delta.removed() {
        println!("  D {rel}");
    }
}
