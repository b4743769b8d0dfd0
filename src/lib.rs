//! # EstlKnet
//!
//! Post-processes CAM-generated G-code for CNC setups with more than one
//! motion core on the same gantry (IDEX-style dual routers, split cut and
//! carve jobs):
//! - reads `(Core: ...)` comments describing each core's axis letter and park position
//! - remaps `X` on motion lines to the active core's axis letter
//! - parks the outgoing core on every `(Tool Change ... [id])`
//! - optionally splits the output into one file per tool change (`(SplitByTool: true)`)
//!
//! ## Architecture
//!
//! 1. **estlknet-core** - config comment parsing, machine state, the streaming rewriter and output segmentation
//! 2. **estlknet** - command line, args files and logging

pub mod cli;

use anyhow::{Context, Result};

pub use cli::{command, parse_args, CliOptions};
pub use estlknet_core::{process_file, KnetError, RunOptions, RunStats};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (set at compile time)
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Version string reported by `--version`
pub const LONG_VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (built ", env!("BUILD_DATE"), ")");

/// Initialize logging
///
/// Sets up structured logging with:
/// - Console output on stderr
/// - RUST_LOG environment variable support
/// - INFO by default, DEBUG when `verbose` is set
pub fn init_logging(verbose: bool) -> Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    let env_filter = EnvFilter::from_default_env().add_directive(level.into());

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(verbose)
        .with_level(true)
        .with_line_number(verbose)
        .compact();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .context("Failed to initialize logging")?;

    Ok(())
}

/// Rewrite the source named by the command-line options.
///
/// # Errors
/// Fails when no source was given, the source does not exist, or an output
/// file cannot be written.
pub fn run(options: &CliOptions) -> Result<RunStats> {
    let source = options
        .source
        .as_ref()
        .context("No source file given")?;
    let stats = process_file(&RunOptions::new(source))
        .with_context(|| format!("FAIL, could not process '{}'", source.display()))?;
    Ok(stats)
}
