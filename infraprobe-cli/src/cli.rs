//! CLI argument parsing using clap derive API
//!
//! Purely declarative: no side effects or I/O.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// infraprobe -- end-to-end validation harness for infrastructure-as-code.
///
/// Each scenario in a suite is applied, checked against live cloud state and
/// destroyed, whatever the outcome.
#[derive(Parser, Debug)]
#[command(name = "infraprobe", version, about, long_about = None)]
pub struct Cli {
    /// Path to the infraprobe.toml configuration file
    /// (default: ./infraprobe.toml if present, otherwise built-in defaults).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Output format.
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Supported output formats.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table / text output.
    Text,
    /// Machine-readable JSON.
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Apply, validate and destroy every scenario of a suite.
    Run(RunArgs),

    /// Check scenario declarations without calling the cloud.
    Validate(SuiteArgs),

    /// List the scenarios of a suite.
    List(SuiteArgs),
}

// ---- run ----

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub suite: SuiteArgs,

    /// Maximum number of scenarios in flight (0 = unbounded).
    #[arg(long)]
    pub max_parallel: Option<usize>,

    /// Default region for scenarios that do not set one.
    #[arg(long)]
    pub region: Option<String>,
}

// ---- validate / list ----

#[derive(Args, Debug)]
pub struct SuiteArgs {
    /// Path to the suite TOML file.
    pub suite: PathBuf,

    /// Only scenarios whose name contains this string.
    #[arg(short, long)]
    pub filter: Option<String>,
}
