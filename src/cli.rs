// src/cli.rs

//! Command-line surface of the `sparks` binary.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `sparks`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "sparks",
    version,
    about = "Run startup tasks in dependency order and report their timings.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the manifest (TOML).
    ///
    /// Default: `SPARKS_CONFIG`, or `Sparks.toml` in the current working
    /// directory.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `SPARKS_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Validate the manifest and print the execution plan without running
    /// anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Print the timing report as JSON instead of text.
    #[arg(long)]
    pub json: bool,
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

pub fn parse() -> CliArgs {
    CliArgs::parse()
}
